//! Torben's median selection.

/// Median of a 2-D matrix without allocating or mutating the input.
///
/// Bisects the value range [min, max], counting elements below, above and
/// equal to the midpoint while tracking the greatest value below it and the
/// least value above it. Each round either terminates or narrows the range
/// to the side holding more elements.
pub fn torben<const R: usize, const C: usize>(m: &[[f64; C]; R]) -> f64 {
    let n = R * C;
    let midn = (n + 1) / 2;

    let mut min = m[0][0];
    let mut max = m[0][0];
    for row in m.iter() {
        for &v in row.iter() {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
    }

    loop {
        let guess = (min + max) / 2.0;
        let mut less = 0usize;
        let mut greater = 0usize;
        let mut equal = 0usize;
        let mut maxltguess = min;
        let mut mingtguess = max;

        for row in m.iter() {
            for &v in row.iter() {
                if v < guess {
                    less += 1;
                    if v > maxltguess {
                        maxltguess = v;
                    }
                } else if v > guess {
                    greater += 1;
                    if v < mingtguess {
                        mingtguess = v;
                    }
                } else {
                    equal += 1;
                }
            }
        }

        if less <= midn && greater <= midn {
            return if less >= midn {
                maxltguess
            } else if less + equal >= midn {
                guess
            } else {
                mingtguess
            };
        } else if less > greater {
            max = maxltguess;
        } else {
            min = mingtguess;
        }
    }
}
