//! Ketama consistent hash continuum.
//!
//! Maps routing keys to labeled buckets the same way the libketama /
//! twemproxy family does, so data sharded by a wire-level proxy stays
//! reachable when the routing moves in-process. Adding or removing a bucket
//! remaps only ~1/N of keys instead of all of them.
//!
//! Continuum points are expanded from MD5 digests of `"<label>-<seed>"`.
//! Keys are hashed with 64-bit FNV-1a truncated to the low 32 bits, matching
//! the proxy configuration this continuum is a drop-in replacement for.

mod md5;

use md5::digest;

/// A weighted, labeled shard position on the continuum.
#[derive(Clone, Debug)]
pub struct Bucket {
    pub label: String,
    pub id: u16,
    pub weight: u32,
}

impl Bucket {
    pub fn new(label: impl Into<String>, id: u16, weight: u32) -> Self {
        Bucket {
            label: label.into(),
            id,
            weight,
        }
    }
}

/// Immutable consistent-hash continuum.
///
/// Construction is the only mutation; lookups can be shared freely across
/// threads.
#[derive(Clone, Debug)]
pub struct Continuum {
    /// (point, bucket id) pairs sorted ascending by point.
    points: Box<[(u32, u16)]>,
    buckets: u16,
}

impl Continuum {
    /// Build a continuum from weighted buckets.
    ///
    /// Each bucket contributes `floor((weight / total_weight) * 40 *
    /// bucket_count)` MD5 digests of `"<label>-<seed>"`, four 32-bit
    /// little-endian points per digest; equal-weight buckets get the
    /// standard 160 points each. The intermediate float narrowing mirrors
    /// the C library's promotion rules so point counts stay bit-identical.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is empty.
    pub fn build(buckets: &[Bucket]) -> Self {
        assert!(!buckets.is_empty(), "continuum needs at least one bucket");

        let total_weight: u64 = buckets.iter().map(|b| u64::from(b.weight)).sum();
        let count = buckets.len();

        let mut points = Vec::with_capacity(count * 160);
        for bucket in buckets {
            let pct = bucket.weight as f32 / total_weight as f32;
            let limit = ((pct as f64) * 40.0 * (count as f64)) as f32 as u32;

            for seed in 0..limit {
                let d = digest(format!("{}-{}", bucket.label, seed).as_bytes());
                for part in 0..4 {
                    let off = part * 4;
                    let point =
                        u32::from_le_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]]);
                    points.push((point, bucket.id));
                }
            }
        }

        // Stable sort: ties keep append order, so the mapping is
        // reproducible across runs as long as labels are unique.
        points.sort_by_key(|&(point, _)| point);

        Continuum {
            points: points.into_boxed_slice(),
            buckets: buckets.len() as u16,
        }
    }

    /// Map a pre-computed key hash to a bucket id: first point `>= hash`,
    /// wrapping to the start of the ring.
    #[inline]
    pub fn lookup(&self, hash: u32) -> u16 {
        let idx = self.points.partition_point(|&(point, _)| point < hash);
        let idx = if idx == self.points.len() { 0 } else { idx };
        self.points[idx].1
    }

    /// Map a routing key to a bucket id.
    #[inline]
    pub fn locate(&self, key: &[u8]) -> u16 {
        self.lookup(hash_key(key))
    }

    /// Number of buckets on the continuum.
    pub fn bucket_count(&self) -> usize {
        self.buckets as usize
    }

    /// Total number of points on the continuum.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

/// Hash a routing key: 64-bit FNV-1a truncated to the low 32 bits.
///
/// Deterministic on the key bytes alone.
#[inline]
pub fn hash_key(key: &[u8]) -> u32 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for &b in key {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash as u32
}
