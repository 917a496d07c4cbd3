//! Index key-prefix resolution.
//!
//! InnoDB rejects indexes whose combined key width exceeds a hard byte
//! ceiling (3072 bytes on modern versions, 767 on older ones, so the value
//! is configuration, not a constant in code). For text-like columns the
//! byte width is `declared_length * bytes_per_char`, which under `utf8mb4`
//! quadruples and routinely blows the limit for schemas written against
//! `latin1`. This module computes safe per-column key-prefix lengths, or
//! reports the index as infeasible so the generator can skip it with a
//! warning instead of failing the run.
//!
//! Everything here is pure arithmetic over numeric inputs.

use crate::domain::schema::ColumnDef;

/// Default InnoDB key-length ceiling in bytes (DYNAMIC/COMPRESSED rows).
pub const DEFAULT_MAX_KEY_BYTES: u32 = 3072;

/// One column of a candidate index, reduced to what the math needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// Fixed-width column (numeric, temporal…): byte width.
    Fixed(u32),
    /// Character or binary column.
    Text {
        /// Declared length in characters; `None` for unbounded types
        /// (TEXT/BLOB families), which always need a prefix.
        chars: Option<u32>,
        /// Max bytes one character occupies under the resolved charset
        /// (1 for binary types).
        bytes_per_char: u32,
        /// Key prefix already present on the master index, if any.
        prefix: Option<u32>,
    },
}

impl KeyPart {
    /// Build a key part from a column definition under a resolved charset.
    pub fn from_column(col: &ColumnDef, bytes_per_char: u32, prefix: Option<u32>) -> Self {
        let ty = col.declared_type.to_lowercase();
        if let Some(chars) = declared_char_length(&ty) {
            let bpc = if is_binary_type(&ty) { 1 } else { bytes_per_char };
            KeyPart::Text {
                chars: Some(chars),
                bytes_per_char: bpc,
                prefix,
            }
        } else if is_unbounded_text(&ty) {
            let bpc = if is_binary_type(&ty) { 1 } else { bytes_per_char };
            KeyPart::Text {
                chars: None,
                bytes_per_char: bpc,
                prefix,
            }
        } else {
            KeyPart::Fixed(fixed_byte_width(&ty))
        }
    }

    /// Effective character length once an existing prefix is applied.
    fn effective_chars(&self) -> Option<u32> {
        match self {
            KeyPart::Fixed(_) => None,
            KeyPart::Text { chars, prefix, .. } => match (chars, prefix) {
                (Some(c), Some(p)) => Some((*c).min(*p)),
                (Some(c), None) => Some(*c),
                (None, Some(p)) => Some(*p),
                (None, None) => None,
            },
        }
    }

    /// Full byte width, `None` when unbounded.
    fn full_bytes(&self) -> Option<u32> {
        match self {
            KeyPart::Fixed(b) => Some(*b),
            KeyPart::Text { bytes_per_char, .. } => {
                self.effective_chars().map(|c| c * bytes_per_char)
            }
        }
    }
}

/// Outcome of resolving one index against the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexResolution {
    /// The index fits as declared; master prefixes (if any) carry over.
    Fits,
    /// Per-column prefixes, aligned with the input parts. `None` entries
    /// are left unprefixed (fixed-width columns and text columns whose
    /// full length fits their share).
    Prefixed(Vec<Option<u32>>),
    /// Even one character per text column exceeds the ceiling.
    Infeasible { needed_bytes: u32 },
}

/// Key-length policy for one destination's storage engine.
#[derive(Debug, Clone, Copy)]
pub struct IndexLengthPolicy {
    pub max_key_bytes: u32,
}

impl Default for IndexLengthPolicy {
    fn default() -> Self {
        Self {
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
        }
    }
}

impl IndexLengthPolicy {
    pub fn new(max_key_bytes: u32) -> Self {
        Self { max_key_bytes }
    }

    /// Resolve prefixes for an index given its parts in key order.
    ///
    /// Text columns whose full width fits in isolation keep their full
    /// length (smallest first, while the remaining columns can still get
    /// one character each). The leftover byte budget is divided among the
    /// remaining text columns proportionally to their full byte widths,
    /// rounded down, minimum one character each. The result never exceeds
    /// `max_key_bytes`.
    pub fn resolve(&self, parts: &[KeyPart]) -> IndexResolution {
        let ceiling = self.max_key_bytes;

        // Fast path: every part bounded and the total fits.
        let total: Option<u32> = parts.iter().try_fold(0u32, |acc, p| {
            p.full_bytes().map(|b| acc.saturating_add(b))
        });
        if let Some(total) = total {
            if total <= ceiling {
                return IndexResolution::Fits;
            }
        }

        let fixed_total: u32 = parts
            .iter()
            .filter_map(|p| match p {
                KeyPart::Fixed(b) => Some(*b),
                _ => None,
            })
            .sum();

        let bpc_of = |p: &KeyPart| match p {
            KeyPart::Text { bytes_per_char, .. } => *bytes_per_char,
            KeyPart::Fixed(_) => 0,
        };

        let text: Vec<(usize, &KeyPart)> = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p, KeyPart::Text { .. }))
            .collect();

        // One character per text column is the floor allocation.
        let min_bytes: u32 = text.iter().map(|(_, p)| bpc_of(p)).sum::<u32>();
        if text.is_empty() {
            return IndexResolution::Infeasible {
                needed_bytes: fixed_total,
            };
        }
        if fixed_total.saturating_add(min_bytes) > ceiling {
            return IndexResolution::Infeasible {
                needed_bytes: fixed_total.saturating_add(min_bytes),
            };
        }

        let budget = ceiling - fixed_total;

        // Phase 1: reserve full width for columns that fit in isolation,
        // smallest first, while every later column can still get at least
        // one character. Not all of them can be reserved here, otherwise
        // the fast path above would have returned Fits.
        let mut by_width = text.clone();
        by_width.sort_by_key(|(_, p)| p.full_bytes().map(u64::from).unwrap_or(u64::MAX));

        let mut reserved = vec![false; parts.len()];
        let mut reserved_bytes: u32 = 0;
        let mut rest_min = min_bytes;
        for (idx, part) in &by_width {
            let Some(full) = part.full_bytes() else { break };
            let min_without = rest_min - bpc_of(part);
            if reserved_bytes + full + min_without <= budget {
                reserved[*idx] = true;
                reserved_bytes += full;
                rest_min = min_without;
            } else {
                break;
            }
        }

        // Phase 2: proportional split of what is left.
        let budget_rest = budget - reserved_bytes;
        let rest: Vec<(usize, &KeyPart)> = text
            .iter()
            .filter(|(idx, _)| !reserved[*idx])
            .copied()
            .collect();

        // Unbounded text columns weigh in as if they wanted the whole budget.
        let weight_of = |p: &KeyPart| -> u64 {
            p.full_bytes()
                .map(u64::from)
                .unwrap_or(u64::from(budget_rest))
                .max(1)
        };
        let weight_total: u64 = rest.iter().map(|(_, p)| weight_of(p)).sum();

        let mut prefixes: Vec<Option<u32>> = vec![None; parts.len()];
        let mut spent: u32 = reserved_bytes;
        for (idx, part) in &rest {
            let KeyPart::Text { bytes_per_char, .. } = part else {
                continue;
            };
            let share_bytes = (u64::from(budget_rest) * weight_of(part) / weight_total) as u32;
            let mut chars = (share_bytes / bytes_per_char).max(1);
            if let Some(full) = part.effective_chars() {
                if chars >= full {
                    // Full length fits inside this column's share: no prefix.
                    spent += full * bytes_per_char;
                    continue;
                }
                chars = chars.min(full);
            }
            spent += chars * bytes_per_char;
            prefixes[*idx] = Some(chars);
        }

        // Rounding plus the minimum-1 floor can overshoot; shave the widest
        // prefixed column until the total is back under budget.
        while spent > budget {
            let widest = prefixes
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.map(|chars| (i, chars)))
                .filter(|(_, chars)| *chars > 1)
                .max_by_key(|(i, chars)| {
                    let KeyPart::Text { bytes_per_char, .. } = &parts[*i] else {
                        return 0;
                    };
                    chars * bytes_per_char
                });
            let Some((i, chars)) = widest else {
                // Everything is already at one character; checked feasible
                // above, so this cannot loop forever.
                break;
            };
            let KeyPart::Text { bytes_per_char, .. } = &parts[i] else {
                break;
            };
            prefixes[i] = Some(chars - 1);
            spent -= bytes_per_char;
        }

        IndexResolution::Prefixed(prefixes)
    }
}

// ─── Declared-type width helpers ─────────────────────────────────────────────

/// Parse the `(n)` length out of `varchar(n)`, `char(n)`, `binary(n)`,
/// `varbinary(n)`. Lowercased input expected.
pub fn declared_char_length(ty: &str) -> Option<u32> {
    let base = ty.split('(').next()?;
    if !matches!(base, "varchar" | "char" | "varbinary" | "binary") {
        return None;
    }
    let inner = ty.split('(').nth(1)?.split(')').next()?;
    inner.trim().parse().ok()
}

/// TEXT/BLOB families: no declared length, a key always needs a prefix.
pub fn is_unbounded_text(ty: &str) -> bool {
    let base = ty.split('(').next().unwrap_or(ty);
    matches!(
        base,
        "tinytext"
            | "text"
            | "mediumtext"
            | "longtext"
            | "tinyblob"
            | "blob"
            | "mediumblob"
            | "longblob"
    )
}

/// True for any column whose byte width depends on the character set.
pub fn is_text_like(ty: &str) -> bool {
    let base = ty.split('(').next().unwrap_or(ty);
    matches!(
        base,
        "varchar" | "char" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set"
    )
}

fn is_binary_type(ty: &str) -> bool {
    let base = ty.split('(').next().unwrap_or(ty);
    matches!(
        base,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob"
    )
}

/// Storage width for fixed-size types. The exact value only matters for
/// key-budget math, so close is good enough; unknown types assume 8.
fn fixed_byte_width(ty: &str) -> u32 {
    // Strip length/precision and `unsigned`/`zerofill` decoration.
    let base = ty
        .split('(')
        .next()
        .unwrap_or(ty)
        .split_whitespace()
        .next()
        .unwrap_or("");
    match base {
        "tinyint" => 1,
        "smallint" => 2,
        "mediumint" => 3,
        "int" | "integer" => 4,
        "bigint" => 8,
        "float" => 4,
        "double" | "real" => 8,
        "decimal" | "numeric" => 8,
        "date" => 3,
        "time" => 3,
        "year" => 1,
        "datetime" => 8,
        "timestamp" => 4,
        "enum" => 2,
        "set" => 8,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(chars: u32, bpc: u32) -> KeyPart {
        KeyPart::Text {
            chars: Some(chars),
            bytes_per_char: bpc,
            prefix: None,
        }
    }

    #[test]
    fn fitting_index_is_left_alone() {
        let policy = IndexLengthPolicy::default();
        let parts = vec![KeyPart::Fixed(8), text(100, 4)];
        assert_eq!(policy.resolve(&parts), IndexResolution::Fits);
    }

    #[test]
    fn single_wide_column_gets_computed_prefix() {
        // varchar(300) utf8mb4 under a 1000-byte ceiling: 300*4 = 1200.
        let policy = IndexLengthPolicy::new(1000);
        let parts = vec![text(300, 4)];
        match policy.resolve(&parts) {
            IndexResolution::Prefixed(p) => {
                assert_eq!(p, vec![Some(250)]);
            }
            other => panic!("expected prefix, got {other:?}"),
        }
    }

    #[test]
    fn prefix_never_exceeds_ceiling() {
        for ceiling in [64, 191, 767, 1000, 3072] {
            for len in [1u32, 50, 255, 300, 1000, 5000] {
                for bpc in [1u32, 2, 3, 4] {
                    let policy = IndexLengthPolicy::new(ceiling);
                    let parts = vec![text(len, bpc), text(len, bpc)];
                    match policy.resolve(&parts) {
                        IndexResolution::Fits => {
                            assert!(len * bpc * 2 <= ceiling);
                        }
                        IndexResolution::Prefixed(prefixes) => {
                            let total: u32 = prefixes
                                .iter()
                                .zip(&parts)
                                .map(|(p, part)| {
                                    let KeyPart::Text {
                                        chars,
                                        bytes_per_char,
                                        ..
                                    } = part
                                    else {
                                        return 0;
                                    };
                                    p.unwrap_or(chars.unwrap()) * bytes_per_char
                                })
                                .sum();
                            assert!(
                                total <= ceiling,
                                "ceiling {ceiling} len {len} bpc {bpc}: total {total}"
                            );
                        }
                        IndexResolution::Infeasible { .. } => {
                            assert!(bpc * 2 > ceiling);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn unbounded_text_always_prefixed() {
        let policy = IndexLengthPolicy::default();
        let parts = vec![KeyPart::Text {
            chars: None,
            bytes_per_char: 4,
            prefix: None,
        }];
        match policy.resolve(&parts) {
            IndexResolution::Prefixed(p) => {
                assert_eq!(p, vec![Some(3072 / 4)]);
            }
            other => panic!("expected prefix, got {other:?}"),
        }
    }

    #[test]
    fn existing_master_prefix_counts_as_effective_length() {
        // text(191) prefix on an unbounded column fits as declared.
        let policy = IndexLengthPolicy::default();
        let parts = vec![KeyPart::Text {
            chars: None,
            bytes_per_char: 4,
            prefix: Some(191),
        }];
        assert_eq!(policy.resolve(&parts), IndexResolution::Fits);
    }

    #[test]
    fn too_many_wide_columns_is_infeasible() {
        // Ten utf8mb4 text columns at one char each need 40 bytes.
        let policy = IndexLengthPolicy::new(39);
        let parts: Vec<KeyPart> = (0..10).map(|_| text(5000, 4)).collect();
        match policy.resolve(&parts) {
            IndexResolution::Infeasible { needed_bytes } => {
                assert_eq!(needed_bytes, 40);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn fixed_columns_consume_budget_first() {
        // 8-byte bigint + varchar(300) utf8mb4 under 1008: budget 1000.
        let policy = IndexLengthPolicy::new(1008);
        let parts = vec![KeyPart::Fixed(8), text(300, 4)];
        match policy.resolve(&parts) {
            IndexResolution::Prefixed(p) => {
                assert_eq!(p, vec![None, Some(250)]);
            }
            other => panic!("expected prefix, got {other:?}"),
        }
    }

    #[test]
    fn short_column_keeps_full_length_next_to_wide_one() {
        // varchar(10) fits its proportional share; only the wide column
        // is prefixed.
        let policy = IndexLengthPolicy::new(400);
        let parts = vec![text(10, 4), text(500, 4)];
        match policy.resolve(&parts) {
            IndexResolution::Prefixed(p) => {
                assert_eq!(p[0], None);
                let wide = p[1].expect("wide column must be prefixed");
                assert!(wide >= 1);
                assert!(40 + wide * 4 <= 400);
            }
            other => panic!("expected prefix, got {other:?}"),
        }
    }

    #[test]
    fn from_column_classifies_types() {
        let col = |ty: &str| ColumnDef {
            name: "c".into(),
            declared_type: ty.into(),
            nullable: true,
            default: None,
            charset: None,
            collation: None,
            auto_increment: false,
            ordinal: 1,
        };
        assert_eq!(
            KeyPart::from_column(&col("varchar(255)"), 4, None),
            KeyPart::Text {
                chars: Some(255),
                bytes_per_char: 4,
                prefix: None
            }
        );
        assert_eq!(KeyPart::from_column(&col("int"), 4, None), KeyPart::Fixed(4));
        assert_eq!(
            KeyPart::from_column(&col("bigint unsigned"), 4, None),
            KeyPart::Fixed(8)
        );
        // binary length is charset-independent
        assert_eq!(
            KeyPart::from_column(&col("varbinary(64)"), 4, None),
            KeyPart::Text {
                chars: Some(64),
                bytes_per_char: 1,
                prefix: None
            }
        );
        assert_eq!(
            KeyPart::from_column(&col("text"), 3, Some(100)),
            KeyPart::Text {
                chars: None,
                bytes_per_char: 3,
                prefix: Some(100)
            }
        );
    }

    #[test]
    fn declared_length_parsing() {
        assert_eq!(declared_char_length("varchar(255)"), Some(255));
        assert_eq!(declared_char_length("char(36)"), Some(36));
        assert_eq!(declared_char_length("int(11)"), None);
        assert_eq!(declared_char_length("text"), None);
    }
}
