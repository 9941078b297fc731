use anyhow::{Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Density assumed for resources without a density qualifier.
pub const DENSITY_MEDIUM: u16 = 160;

/// The qualifiers of a `ResTable_config` that package inspection uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResConfig {
    pub language: [u8; 2],
    pub country: [u8; 2],
    pub density: u16,
}

impl ResConfig {
    /// Parse a config from its serialized form, starting at its size field.
    ///
    /// Older tables write shorter configs; missing fields stay zero.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            bail!("Resource configuration is truncated");
        }
        let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let bytes = &bytes[..declared.clamp(4, bytes.len())];

        let mut config = Self::default();
        if bytes.len() >= 12 {
            config.language = [bytes[8], bytes[9]];
            config.country = [bytes[10], bytes[11]];
        }
        if bytes.len() >= 16 {
            let mut cursor = Cursor::new(&bytes[14..16]);
            config.density = cursor.read_u16::<LittleEndian>()?;
        }
        Ok(config)
    }

    /// Whether this config carries a locale qualifier
    pub fn has_locale(&self) -> bool {
        self.language != [0, 0]
    }

    /// Whether this config's density serves `requested` better than `other`'s.
    ///
    /// Follows the framework's rule: an exact match wins; when both are above
    /// or both below the request, the nearer one from above (resp. the larger
    /// one) wins; otherwise scaling down is considered twice as good as
    /// scaling up.
    pub fn is_better_density(&self, other: &ResConfig, requested: u16) -> bool {
        if self.density == other.density {
            return false;
        }

        let requested = effective_density(requested);
        let mine = effective_density(self.density);
        let theirs = effective_density(other.density);
        if mine == theirs {
            return false;
        }
        if mine == requested {
            return true;
        }
        if theirs == requested {
            return false;
        }

        let (high, low, mine_is_bigger) = if mine > theirs {
            (mine, theirs, true)
        } else {
            (theirs, mine, false)
        };

        if requested >= high {
            // requested is bigger than both
            mine_is_bigger
        } else if low >= requested {
            // requested is smaller than both
            !mine_is_bigger
        } else if (2 * low - requested) * high > requested * requested {
            !mine_is_bigger
        } else {
            mine_is_bigger
        }
    }
}

fn effective_density(density: u16) -> i64 {
    if density == 0 {
        DENSITY_MEDIUM as i64
    } else {
        density as i64
    }
}

/// Order candidates from best to worst density match for `requested`.
pub fn rank_by_density<T>(mut candidates: Vec<(ResConfig, T)>, requested: u16) -> Vec<(ResConfig, T)> {
    let mut ranked = Vec::with_capacity(candidates.len());
    while !candidates.is_empty() {
        let mut best = 0;
        for i in 1..candidates.len() {
            if candidates[i].0.is_better_density(&candidates[best].0, requested) {
                best = i;
            }
        }
        ranked.push(candidates.remove(best));
    }
    ranked
}
