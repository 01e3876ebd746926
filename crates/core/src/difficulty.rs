//! 256-bit boundary and difficulty arithmetic
//!
//! A final hash `h` satisfies difficulty `d` when `h * d <= 2^256`, which is
//! the same as `h <= floor(2^256 / d)`, the boundary. All values are
//! big-endian 256-bit integers stored in a [`Hash256`].

use crate::hash::Hash256;

/// Big-endian bytes to little-endian 64-bit limbs
fn to_limbs(value: &Hash256) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut bytes = [0u8; 8];
        let start = (3 - i) * 8;
        bytes.copy_from_slice(&value.0[start..start + 8]);
        *limb = u64::from_be_bytes(bytes);
    }
    limbs
}

/// Big-endian bytes to little-endian 32-bit digits
fn to_digits(value: &Hash256) -> [u32; 8] {
    let mut digits = [0u32; 8];
    for (i, digit) in digits.iter_mut().enumerate() {
        let start = (7 - i) * 4;
        let b = &value.0[start..start + 4];
        *digit = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    }
    digits
}

fn from_digits(digits: &[u32; 8]) -> Hash256 {
    let mut out = Hash256::zero();
    for (i, digit) in digits.iter().enumerate() {
        let start = (7 - i) * 4;
        out.0[start..start + 4].copy_from_slice(&digit.to_be_bytes());
    }
    out
}

/// `final_hash * difficulty <= 2^256`
///
/// Schoolbook 4x4 limb multiplication into a 512-bit product. Cheaper than
/// turning the difficulty into a boundary first.
pub fn check_against_difficulty(final_hash: &Hash256, difficulty: &Hash256) -> bool {
    let h = to_limbs(final_hash);
    let d = to_limbs(difficulty);

    let mut p = [0u64; 8];
    for (j, dj) in d.iter().enumerate() {
        let mut carry = 0u64;
        for (i, hi) in h.iter().enumerate() {
            let t = u128::from(*hi) * u128::from(*dj) + u128::from(p[i + j]) + u128::from(carry);
            p[i + j] = t as u64;
            carry = (t >> 64) as u64;
        }
        p[j + 4] = carry;
    }

    if p[4..].iter().all(|&limb| limb == 0) {
        return true;
    }

    // The only product with high limbs set that still passes is exactly 2^256
    p[..4].iter().all(|&limb| limb == 0) && p[4] == 1 && p[5..].iter().all(|&limb| limb == 0)
}

/// `floor(2^256 / difficulty)`, all ones for difficulty 0 or 1
pub fn difficulty_to_boundary(difficulty: &Hash256) -> Hash256 {
    let v = to_digits(difficulty);
    let n = v.iter().rposition(|&d| d != 0).map_or(0, |top| top + 1);

    if n == 0 || (n == 1 && v[0] == 1) {
        return Hash256::MAX;
    }

    let q = if n <= 2 {
        divide_short(u64::from(v[0]) | (u64::from(v[1]) << 32))
    } else {
        divide_long(&v[..n])
    };
    from_digits(&q)
}

/// `2^256 / d` for `2 <= d < 2^64`, one 64-bit limb at a time
fn divide_short(d: u64) -> [u32; 8] {
    let d = u128::from(d);
    let mut q = [0u32; 8];
    // Top limb of 2^256 is 1, the four below are zero
    let mut rem = 1u128 % d;
    for i in (0..4).rev() {
        let cur = rem << 64;
        let limb = (cur / d) as u64;
        rem = cur % d;
        q[2 * i] = limb as u32;
        q[2 * i + 1] = (limb >> 32) as u32;
    }
    q
}

/// `2^256 / v` for a divisor of 3 to 8 digits (Knuth, Algorithm D)
fn divide_long(v: &[u32]) -> [u32; 8] {
    const BASE: u64 = 1 << 32;
    // 2^256 has 9 base-2^32 digits
    const NUM_DIGITS: usize = 9;

    let n = v.len();
    let m = NUM_DIGITS - n;

    // Normalize so the top divisor digit has its high bit set
    let s = v[n - 1].leading_zeros();
    let mut vn = [0u32; 8];
    for i in (1..n).rev() {
        vn[i] = ((u64::from(v[i]) << s) | (u64::from(v[i - 1]) >> (32 - s))) as u32;
    }
    vn[0] = v[0] << s;

    // 2^256 shifted left by s, plus the extra top digit
    let mut un = [0u32; NUM_DIGITS + 1];
    un[NUM_DIGITS - 1] = 1 << s;

    let v_top = u64::from(vn[n - 1]);
    let v_next = u64::from(vn[n - 2]);
    let mut q = [0u32; 8];

    for j in (0..=m).rev() {
        let num = (u64::from(un[j + n]) << 32) | u64::from(un[j + n - 1]);
        let mut qhat = num / v_top;
        let mut rhat = num % v_top;
        while qhat >= BASE || qhat * v_next > ((rhat << 32) | u64::from(un[j + n - 2])) {
            qhat -= 1;
            rhat += v_top;
            if rhat >= BASE {
                break;
            }
        }

        // un[j..j + n + 1] -= qhat * vn
        let mut borrow = 0i64;
        for i in 0..n {
            let p = qhat * u64::from(vn[i]);
            let t = i64::from(un[i + j]) - borrow - (p & 0xffff_ffff) as i64;
            un[i + j] = t as u32;
            borrow = (p >> 32) as i64 - (t >> 32);
        }
        let t = i64::from(un[j + n]) - borrow;
        un[j + n] = t as u32;

        q[j] = qhat as u32;
        if t < 0 {
            // Estimate was one too large, add the divisor back
            q[j] = q[j].wrapping_sub(1);
            let mut carry = 0u64;
            for i in 0..n {
                let sum = u64::from(un[i + j]) + u64::from(vn[i]) + carry;
                un[i + j] = sum as u32;
                carry = sum >> 32;
            }
            un[j + n] = un[j + n].wrapping_add(carry as u32);
        }
    }
    q
}
