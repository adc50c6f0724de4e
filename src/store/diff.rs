//! Ordered-sequence difference (Myers, O((N+M)·D)).
//!
//! Offsets follow the usual application order: removals refer to the old
//! sequence and come in descending order, insertions refer to the new
//! sequence and come in ascending order. Removing then inserting turns the
//! old sequence into the new one.

/// Edit script between two sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Difference {
    /// Offsets into the old sequence, descending.
    pub removals: Vec<usize>,
    /// Offsets into the new sequence, ascending.
    pub insertions: Vec<usize>,
}

impl Difference {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.insertions.is_empty()
    }

    /// Total number of edits.
    #[inline]
    pub fn len(&self) -> usize {
        self.removals.len() + self.insertions.len()
    }

    /// Apply to `items`, taking inserted values in insertion order.
    ///
    /// `inserted` must hold one value per insertion offset.
    pub fn apply<T>(&self, items: &mut Vec<T>, inserted: Vec<T>) {
        debug_assert_eq!(inserted.len(), self.insertions.len());
        for &offset in &self.removals {
            items.remove(offset);
        }
        for (&offset, value) in self.insertions.iter().zip(inserted) {
            items.insert(offset, value);
        }
    }
}

/// Compute the edit script turning `old` into `new`.
pub fn difference<T: PartialEq>(old: &[T], new: &[T]) -> Difference {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    let mut diff = Difference::default();
    myers(a, b, &mut diff);
    for offset in diff.removals.iter_mut().chain(diff.insertions.iter_mut()) {
        *offset += prefix;
    }
    diff
}

fn myers<T: PartialEq>(a: &[T], b: &[T], diff: &mut Difference) {
    if a.is_empty() {
        diff.insertions.extend(0..b.len());
        return;
    }
    if b.is_empty() {
        diff.removals.extend((0..a.len()).rev());
        return;
    }

    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max;
    let mut v = vec![0isize; (2 * max + 2) as usize];
    // trace[d] holds the furthest x per diagonal k in -(d-1)..=d-1 after round d-1
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut depth = max;

    'search: for d in 0..=max {
        trace.push(if d == 0 {
            Vec::new()
        } else {
            v[(offset - d + 1) as usize..=(offset + d - 1) as usize].to_vec()
        });
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                depth = d;
                break 'search;
            }
            k += 2;
        }
    }

    let (mut x, mut y) = (n, m);
    for d in (1..=depth).rev() {
        let snapshot = &trace[d as usize];
        let at = |k: isize| snapshot[(k + d - 1) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) { k + 1 } else { k - 1 };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            diff.insertions.push(prev_y as usize);
        } else {
            diff.removals.push(prev_x as usize);
        }
        x = prev_x;
        y = prev_y;
    }
    diff.insertions.reverse();
}
