//! Prime sizing for cache and dataset item counts

/// Trial division by odd divisors, for odd `n >= 3`
fn is_odd_prime(n: u32) -> bool {
    let n = u64::from(n);
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Largest prime not greater than `upper_bound`, or 0 when there is none
pub fn find_largest_prime(upper_bound: u32) -> u32 {
    if upper_bound < 2 {
        return 0;
    }
    if upper_bound == 2 {
        return 2;
    }

    let mut n = if upper_bound % 2 == 0 {
        upper_bound - 1
    } else {
        upper_bound
    };
    while !is_odd_prime(n) {
        n -= 2;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_bounds() {
        assert_eq!(find_largest_prime(0), 0);
        assert_eq!(find_largest_prime(1), 0);
        assert_eq!(find_largest_prime(2), 2);
        assert_eq!(find_largest_prime(3), 3);
        assert_eq!(find_largest_prime(4), 3);
        assert_eq!(find_largest_prime(9), 7);
        assert_eq!(find_largest_prime(10), 7);
        assert_eq!(find_largest_prime(25), 23);
        assert_eq!(find_largest_prime(49), 47);
    }

    #[test]
    fn test_large_bounds() {
        assert_eq!(find_largest_prime(262_144), 262_139);
        assert_eq!(find_largest_prime(8_388_608), 8_388_593);
        assert_eq!(find_largest_prime(u32::MAX), 4_294_967_291);
        assert_eq!(find_largest_prime(2_147_483_647), 2_147_483_647);
    }
}
