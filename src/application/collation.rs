//! Charset/collation normalization.
//!
//! Pure and total: given any (master, destination-default) pair this module
//! always produces a valid charset/collation pair. It degrades by fallback,
//! never by error, and a multi-byte master charset is never narrowed to a
//! single-byte destination default.

use crate::domain::value_objects::{Charset, Collation};

/// Maximum bytes one character can occupy under a charset.
///
/// Unknown charsets are assumed single-byte, which is the conservative
/// choice for index-length math only when the charset really is exotic;
/// all charsets MySQL ships with multi-byte encodings are listed.
pub fn bytes_per_char(charset: &Charset) -> u32 {
    match charset.as_str() {
        "utf8mb4" | "utf16" | "utf16le" | "utf32" => 4,
        "utf8" | "utf8mb3" | "eucjpms" | "ujis" => 3,
        "ucs2" | "big5" | "gbk" | "gb2312" | "sjis" | "euckr" | "cp932" => 2,
        _ => 1,
    }
}

pub fn is_multibyte(charset: &Charset) -> bool {
    bytes_per_char(charset) > 1
}

/// The canonical "unicode case-insensitive" collation for a charset.
fn unicode_ci(charset: &Charset) -> Collation {
    Collation(format!("{}_unicode_ci", charset))
}

/// Resolve the effective charset/collation for a column or table landing on
/// a destination.
///
/// Policy:
/// - master's explicit pair is preferred when it carries one;
/// - a multi-byte master charset resolves to a 4-byte capable charset even
///   when the destination default is single-byte (legacy `utf8`/`utf8mb3`
///   and the UTF-16/32 families all resolve to `utf8mb4` rather than
///   silently truncating);
/// - when the preferred collation does not belong to the resolved charset,
///   the destination default is tried, then `<charset>_unicode_ci`.
pub fn resolve_collation(
    master_charset: Option<&Charset>,
    master_collation: Option<&Collation>,
    dest_charset: &Charset,
    dest_collation: &Collation,
) -> (Charset, Collation) {
    let preferred = master_charset.unwrap_or(dest_charset);

    // 2- and 3-byte variants upgrade to the 4-byte equivalent; 4-byte and
    // single-byte charsets pass through.
    let charset = if is_multibyte(preferred) && bytes_per_char(preferred) < 4 {
        Charset("utf8mb4".to_string())
    } else {
        preferred.clone()
    };

    let collation = [master_collation, Some(dest_collation)]
        .into_iter()
        .flatten()
        .find(|c| c.belongs_to(&charset))
        .cloned()
        .unwrap_or_else(|| unicode_ci(&charset));

    (charset, collation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(s: &str) -> Charset {
        Charset(s.to_string())
    }

    fn coll(s: &str) -> Collation {
        Collation(s.to_string())
    }

    #[test]
    fn master_pair_preferred_when_destination_matches() {
        let (charset, collation) = resolve_collation(
            Some(&cs("utf8mb4")),
            Some(&coll("utf8mb4_general_ci")),
            &cs("utf8mb4"),
            &coll("utf8mb4_unicode_ci"),
        );
        assert_eq!(charset, cs("utf8mb4"));
        assert_eq!(collation, coll("utf8mb4_general_ci"));
    }

    #[test]
    fn multibyte_master_survives_single_byte_destination() {
        let (charset, _) = resolve_collation(
            Some(&cs("utf8mb4")),
            Some(&coll("utf8mb4_unicode_ci")),
            &cs("latin1"),
            &coll("latin1_swedish_ci"),
        );
        assert!(is_multibyte(&charset));
        assert_eq!(charset, cs("utf8mb4"));
    }

    #[test]
    fn legacy_utf8_upgrades_to_utf8mb4() {
        let (charset, collation) = resolve_collation(
            Some(&cs("utf8")),
            Some(&coll("utf8_general_ci")),
            &cs("latin1"),
            &coll("latin1_swedish_ci"),
        );
        assert_eq!(charset, cs("utf8mb4"));
        // utf8_general_ci does not belong to utf8mb4, latin1_swedish_ci
        // neither: canonical fallback applies.
        assert_eq!(collation, coll("utf8mb4_unicode_ci"));
    }

    #[test]
    fn no_master_charset_uses_destination_defaults() {
        let (charset, collation) = resolve_collation(
            None,
            None,
            &cs("latin1"),
            &coll("latin1_swedish_ci"),
        );
        assert_eq!(charset, cs("latin1"));
        assert_eq!(collation, coll("latin1_swedish_ci"));
    }

    #[test]
    fn destination_collation_reused_when_master_collation_missing() {
        let (charset, collation) = resolve_collation(
            Some(&cs("utf8mb4")),
            None,
            &cs("utf8mb4"),
            &coll("utf8mb4_danish_ci"),
        );
        assert_eq!(charset, cs("utf8mb4"));
        assert_eq!(collation, coll("utf8mb4_danish_ci"));
    }

    #[test]
    fn total_over_charset_pairs() {
        // Exhaustive-ish grid: resolve_collation must return a collation
        // belonging to the returned charset for every combination.
        let charsets = ["utf8mb4", "utf8", "latin1", "ucs2", "ascii", "greek", "utf16"];
        for m in charsets {
            for d in charsets {
                let (charset, collation) = resolve_collation(
                    Some(&cs(m)),
                    Some(&coll(&format!("{m}_general_ci"))),
                    &cs(d),
                    &coll(&format!("{d}_general_ci")),
                );
                assert!(
                    collation.belongs_to(&charset),
                    "{m}/{d} resolved to mismatched pair {charset}/{collation}"
                );
                if is_multibyte(&cs(m)) {
                    assert!(is_multibyte(&charset), "{m} narrowed to {charset}");
                }
            }
        }
    }
}
