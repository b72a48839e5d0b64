use ndarray::{
    Array1,
    Array2,
    Array3,
};
use regex::Regex;
use anyhow::bail;

pub type Result<T> = anyhow::Result<T>;

pub type Vector<T> = Array1<T>;  // Define this type to use broadcast operations.
pub type Matrix<T> = Array2<T>;
pub type Cube<T>   = Array3<T>;
pub type Mat33<T>  = [[T;3];3];   // 3x3 matrix

pub type Mask = Vec<bool>;


/// Hartree to eV.
pub const HARTREE: f64 = 27.2114;

/// Bohr to Angstrom, as used for the Bravais matrix.
pub const BOHR_TO_ANGSTROM: f64 = 0.52;


/// Parse a range expression like "3", "-2", "1..4" or "-3..-1" into a list of signed indices.
///
/// Both ends are inclusive. A range whose start is greater than its end is rejected.
pub fn range_parse(input: &str) -> Result<Vec<i32>> {
    let (start, end) = range_bounds(input)?;
    Ok((start ..= end).collect())
}


/// Same as `range_parse` but every index must address one of `len` items, counting from the
/// tail when negative. The bounds are checked before any index is produced.
pub fn range_parse_bounded(input: &str, len: usize) -> Result<Vec<i32>> {
    let (start, end) = range_bounds(input)?;
    let len = len as i64;
    if (start as i64) < -len || (end as i64) > len {
        bail!("Index out of range in `{}`, only {} available", input, len);
    }
    Ok((start ..= end).collect())
}


fn range_bounds(input: &str) -> Result<(i32, i32)> {
    let re = Regex::new(r"^(?P<start>[+-]?\d+)(?:\.\.(?P<end>[+-]?\d+))?$")?;
    let caps = match re.captures(input.trim()) {
        Some(c) => c,
        None => bail!("Invalid range expression: `{}`", input),
    };

    let start = caps["start"].parse::<i32>()?;
    let end = match caps.name("end") {
        Some(e) => e.as_str().parse::<i32>()?,
        None => start,
    };

    if start > end {
        bail!("Invalid range `{}`: start index is greater than the end index", input);
    }
    Ok((start, end))
}


/// Map signed 1-based indices onto positive 1-based indices.
///
/// Negative indices count from the tail, `-1` is `len`. A `0` anywhere selects everything.
pub fn index_transform(v: Vec<i32>, len: usize) -> Vec<usize> {
    if v.contains(&0) {
        (1 ..= len).collect()
    } else {
        v.into_iter()
         .map(|i| {
            if i < 0 {
                (i + len as i32 + 1).max(0) as usize
            } else {
                i as usize
            }
         })
        .collect()
    }
}
