//! An adaptive segment tree over `[0, B)` biasing selection toward
//! high-reward regions (spec §4.3).

use rand::Rng;
use tracing::warn;

fn ratio(score: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        score / count as f64
    }
}

struct Node {
    start: u32,
    end: u32,
    count: u64,
    score: f64,
    /// Set once this node has performed its "biased re-insert into the
    /// hotter child" step at least once. Purely observational — it does
    /// not gate future splits, since the rule is "at most once *per
    /// insert*", not "at most once ever" (spec §4.3 step 4).
    split: bool,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(at: u32) -> Self {
        Self {
            start: at,
            end: at,
            count: 0,
            score: 0.0,
            split: false,
            left: None,
            right: None,
        }
    }

    fn build(start: u32, end: u32) -> Self {
        if start == end {
            return Self::leaf(start);
        }
        let mid = start + (end - start) / 2;
        Self {
            start,
            end,
            count: 0,
            score: 0.0,
            split: false,
            left: Some(Box::new(Node::build(start, mid))),
            right: Some(Box::new(Node::build(mid + 1, end))),
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    /// Descends toward `key`, bumping `count`/`score` along the path, then
    /// applies the post-order imbalance check (spec §4.3 step 4).
    fn insert(&mut self, key: u32, value: f64, split_ratio: f64) {
        self.count += 1;
        self.score += value;
        if self.is_leaf() {
            return;
        }
        let left = self.left.as_mut().unwrap();
        let right = self.right.as_mut().unwrap();
        if key <= left.end {
            left.insert(key, value, split_ratio);
        } else {
            right.insert(key, value, split_ratio);
        }

        let r_l = ratio(left.score, left.count);
        let r_r = ratio(right.score, right.count);
        if r_l > 0.0 && r_r > 0.0 {
            let (hi, lo) = if r_l >= r_r { (r_l, r_r) } else { (r_r, r_l) };
            if hi / lo > split_ratio {
                self.split = true;
                if r_l >= r_r {
                    left.insert(key, value, split_ratio);
                } else {
                    right.insert(key, value, split_ratio);
                }
            }
        }
    }

    /// Greedy descent picking the child with the larger `score/count`
    /// ratio, ties broken uniformly at random (spec §4.3 `select()`).
    fn select(&self, rng: &mut impl Rng) -> u32 {
        if self.is_leaf() {
            return self.start;
        }
        let left = self.left.as_ref().unwrap();
        let right = self.right.as_ref().unwrap();
        let r_l = ratio(left.score, left.count);
        let r_r = ratio(right.score, right.count);
        let go_left = match r_l.partial_cmp(&r_r) {
            Some(std::cmp::Ordering::Greater) => true,
            Some(std::cmp::Ordering::Less) => false,
            _ => rng.gen_bool(0.5),
        };
        if go_left {
            left.select(rng)
        } else {
            right.select(rng)
        }
    }
}

/// Adaptive segment tree over the quantized location axis.
pub struct IntervalTree {
    interval_size: u32,
    split_ratio: f64,
    root: Node,
    /// Per-leaf raw arrays: the source of truth independent of whatever
    /// bonus credit splitting gives internal nodes (spec §4.3
    /// "Construction").
    leaf_count: Vec<u64>,
    leaf_score: Vec<f64>,
    /// Number of `insert` calls actually made, i.e. the real observation
    /// count used for the warm-up gate in `select()` — deliberately not
    /// `root.count`, which accrues bonus increments from splitting.
    total_observations: u64,
}

impl IntervalTree {
    /// Builds a tree covering `[0, interval_size)`. `interval_size` should
    /// be a nonzero power of two; callers validate this once at
    /// [`crate::SchedulerConfig::validate`] time.
    pub fn new(interval_size: u32, split_ratio: f64) -> Self {
        Self {
            interval_size,
            split_ratio,
            root: Node::build(0, interval_size - 1),
            leaf_count: vec![0; interval_size as usize],
            leaf_score: vec![0.0; interval_size as usize],
            total_observations: 0,
        }
    }

    /// Records an observation of `value` at bucket `key`. Out-of-range
    /// keys are dropped with a warning rather than propagated as an error
    /// (spec §7 "Out-of-range quantized location").
    pub fn insert(&mut self, key: u32, value: u64) {
        if key >= self.interval_size {
            warn!(
                target: "dafl_sched::interval_tree",
                key,
                interval_size = self.interval_size,
                "dropped observation with out-of-range quantized location"
            );
            return;
        }
        let value = value as f64;
        self.leaf_count[key as usize] += 1;
        self.leaf_score[key as usize] += value;
        self.total_observations += 1;
        self.root.insert(key, value, self.split_ratio);
    }

    /// Samples a bucket: uniform until warm-up (`B` observations) has
    /// elapsed, then greedy toward the highest-ratio region thereafter
    /// (spec §4.3 `select()`).
    pub fn select(&self, rng: &mut impl Rng) -> u32 {
        if self.total_observations < u64::from(self.interval_size) {
            return rng.gen_range(0..self.interval_size);
        }
        self.root.select(rng)
    }

    /// Raw per-bucket observation count (ground truth, unaffected by
    /// splitting bonuses).
    pub fn leaf_count(&self, bucket: u32) -> u64 {
        self.leaf_count[bucket as usize]
    }

    /// Raw per-bucket cumulative score (ground truth, unaffected by
    /// splitting bonuses).
    pub fn leaf_score(&self, bucket: u32) -> f64 {
        self.leaf_score[bucket as usize]
    }

    /// Total number of `insert` calls that landed in range.
    pub fn total_observations(&self) -> u64 {
        self.total_observations
    }

    /// Number of buckets this tree covers (`B`).
    pub fn interval_size(&self) -> u32 {
        self.interval_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn out_of_range_insert_is_dropped() {
        let mut tree = IntervalTree::new(16, 1.5);
        tree.insert(100, 5);
        assert_eq!(tree.total_observations(), 0);
    }

    #[test]
    fn warm_up_is_uniform() {
        let mut tree = IntervalTree::new(8, 1.5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..4 {
            tree.insert(rng.gen_range(0..8), 1);
        }
        // Still below B=8 observations: every select() call must be a
        // uniform draw, independent of what's been inserted so far.
        for _ in 0..50 {
            let b = tree.select(&mut rng);
            assert!(b < 8);
        }
    }

    #[test]
    fn post_warm_up_biases_toward_hot_bucket() {
        let mut tree = IntervalTree::new(1024, 1.5);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..2048 {
            if rng.gen_bool(0.9) {
                tree.insert(100, 10);
            } else {
                tree.insert(rng.gen_range(0..1024), 1);
            }
        }
        let mut hits_on_100 = 0u32;
        const TRIALS: u32 = 10_000;
        for _ in 0..TRIALS {
            if tree.select(&mut rng) == 100 {
                hits_on_100 += 1;
            }
        }
        let freq = f64::from(hits_on_100) / f64::from(TRIALS);
        assert!(freq >= 0.7, "expected frequency >= 0.7, got {freq}");
    }

    #[test]
    fn leaf_arrays_track_raw_observations_independent_of_split_bonus() {
        let mut tree = IntervalTree::new(16, 1.5);
        for _ in 0..5 {
            tree.insert(3, 10);
        }
        assert_eq!(tree.leaf_count(3), 5);
        assert_eq!(tree.leaf_score(3), 50.0);
    }
}
