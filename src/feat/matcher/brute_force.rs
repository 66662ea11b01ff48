use crate::feat::{descriptors::Descriptor, Distance};

use super::{Match, Matcher};

pub struct BruteForceMathcer<T>
where
    T: Distance + Clone,
{
    descriptors: (Vec<Descriptor<T>>, Vec<Descriptor<T>>),
    allow_duplicate: bool,
}

impl<T> BruteForceMathcer<T>
where
    T: Distance + Clone,
{
    pub fn new(
        lhs_descs: Vec<Descriptor<T>>,
        rhs_descs: Vec<Descriptor<T>>,
        allow_duplicate: bool,
    ) -> Self {
        BruteForceMathcer {
            descriptors: (lhs_descs, rhs_descs),
            allow_duplicate,
        }
    }
}

impl<T> Matcher<T> for BruteForceMathcer<T>
where
    T: Distance + Clone,
{
    fn run(&self) -> Vec<Match<T>> {
        let lhs_descs = &self.descriptors.0;
        let rhs_descs = &self.descriptors.1;

        // vector of tuple : (distance, lhs_idx, rhs_idx)
        let mut dists: Vec<(f32, usize, usize)> =
            Vec::with_capacity(lhs_descs.len() * rhs_descs.len());
        for li in 0..lhs_descs.len() {
            for ri in 0..rhs_descs.len() {
                let dist = lhs_descs[li].distance(&rhs_descs[ri]);
                dists.push((dist, li, ri));
            }
        }
        dists.sort_by(|l, r| l.0.partial_cmp(&r.0).unwrap());

        let mut matches = Vec::new();
        let mut lflag: Vec<bool> = vec![true; lhs_descs.len()];
        let mut rflag: Vec<bool> = vec![true; rhs_descs.len()];
        for m in dists {
            // println!("lhs_idx = {}, rhs_idx = {}", m.1, m.2);
            if lflag[m.1] && rflag[m.2] {
                matches.push(Match::new(&lhs_descs[m.1], &rhs_descs[m.2]));
                if self.allow_duplicate {
                    lflag[m.1] = false;
                    rflag[m.2] = false;
                }
            }
            if !self.allow_duplicate {
                lflag[m.1] = false;
                rflag[m.2] = false;
            }
        }
        matches
    }
}

/// Match `lhs_descs` against `rhs_descs` keeping a pair only if (a) the best match beats
/// the second-best by `ratio` (Lowe's ratio test) and (b) the match is mutually the best
/// for both sides (cross-check). Returns `(lhs_idx, rhs_idx)` pairs.
pub fn ratio_cross_check_match<T>(
    lhs_descs: &[Descriptor<T>],
    rhs_descs: &[Descriptor<T>],
    ratio: f32,
) -> Vec<(usize, usize)>
where
    T: Distance + Clone,
{
    fn nearest_two<T: Distance + Clone>(
        src: &[Descriptor<T>],
        dst: &[Descriptor<T>],
    ) -> Vec<Option<(usize, f32, f32)>> {
        src.iter()
            .map(|d| {
                let mut best = (usize::MAX, f32::INFINITY);
                let mut second = f32::INFINITY;
                for (j, other) in dst.iter().enumerate() {
                    let dist = d.distance(other);
                    if dist < best.1 {
                        second = best.1;
                        best = (j, dist);
                    } else if dist < second {
                        second = dist;
                    }
                }
                if best.0 == usize::MAX {
                    None
                } else {
                    Some((best.0, best.1, second))
                }
            })
            .collect()
    }

    let lhs_to_rhs = nearest_two(lhs_descs, rhs_descs);
    let rhs_to_lhs = nearest_two(rhs_descs, lhs_descs);

    let mut matches = Vec::new();
    for (i, candidate) in lhs_to_rhs.iter().enumerate() {
        let (j, best, second) = match candidate {
            Some(v) => *v,
            None => continue,
        };
        if second.is_finite() && best > ratio * second {
            continue;
        }
        if let Some((back_i, _, _)) = rhs_to_lhs[j] {
            if back_i == i {
                matches.push((i, j));
            }
        }
    }
    matches
}
