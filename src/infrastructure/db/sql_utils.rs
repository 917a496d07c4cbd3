//! MySQL string building: identifier quoting, literals, SELECT/INSERT
//! construction.
//!
//! Pure string manipulation with no sqlx dependency, so the application
//! layer (generator, migrator) can use it without touching the driver.

use serde_json::Value;

/// Quote an identifier (database, table, column) with backticks.
pub fn quote_ident(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

/// `\`db\`.\`table\`` qualified reference.
pub fn qualify(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

// ─── Value codecs ────────────────────────────────────────────────────────────

/// How a column travels through a data copy.
///
/// Numeric columns pass through the driver natively; everything stringy is
/// converted to utf8mb4 on SELECT (the driver returns information_schema
/// style columns as bytes otherwise); binary columns are hex-encoded on
/// SELECT and re-emitted as `X'…'` literals so no byte is ever run through
/// a charset conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCodec {
    Numeric,
    Text,
    Hex,
}

/// Pick the codec for a column from its declared type.
///
/// Declared types carry decoration (`bigint unsigned`, `int(11)`); only
/// the leading keyword matters here.
pub fn codec_for(declared_type: &str) -> ValueCodec {
    let ty = declared_type.to_lowercase();
    let base = ty
        .split('(')
        .next()
        .unwrap_or(&ty)
        .split_whitespace()
        .next()
        .unwrap_or("");
    match base {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "float"
        | "double" | "real" | "year" => ValueCodec::Numeric,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bit" => {
            ValueCodec::Hex
        }
        _ => ValueCodec::Text,
    }
}

/// SELECT expression for one column under its codec.
pub fn select_expr(column: &str, codec: ValueCodec) -> String {
    let q = quote_ident(column);
    match codec {
        ValueCodec::Numeric => q,
        ValueCodec::Text => format!("CONVERT({q} USING utf8mb4) AS {q}"),
        ValueCodec::Hex => format!("HEX({q}) AS {q}"),
    }
}

/// Format a fetched value as a MySQL literal under its codec.
pub fn sql_literal(value: &Value, codec: ValueCodec) -> String {
    match (value, codec) {
        (Value::Null, _) => "NULL".to_string(),
        (Value::Bool(b), _) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        (Value::Number(n), _) => n.to_string(),
        (Value::String(s), ValueCodec::Hex) => format!("X'{s}'"),
        (Value::String(s), _) => quote_string(s),
        // Arrays/objects only appear for JSON columns, which travel as text.
        (other, _) => quote_string(&serde_json::to_string(other).unwrap_or_default()),
    }
}

/// Escape and single-quote a string literal. Backslashes are doubled too:
/// MySQL treats them as escapes unless NO_BACKSLASH_ESCAPES is set.
fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// Render one row as a parenthesized value tuple.
pub fn render_row(values: &[Value], codecs: &[ValueCodec]) -> String {
    let rendered: Vec<String> = values
        .iter()
        .zip(codecs.iter())
        .map(|(v, c)| sql_literal(v, *c))
        .collect();
    format!("({})", rendered.join(", "))
}

// ─── Query builders ──────────────────────────────────────────────────────────

/// Paged SELECT over the source table. `filter` is spliced in verbatim;
/// ORDER BY keeps LIMIT/OFFSET pagination stable and is omitted when no
/// ordering columns exist.
pub fn build_batch_select(
    database: &str,
    table: &str,
    select_exprs: &[String],
    order_by: &[String],
    filter: Option<&str>,
    offset: u64,
    limit: u64,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        select_exprs.join(", "),
        qualify(database, table)
    );
    if let Some(expr) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(expr);
    }
    if !order_by.is_empty() {
        let cols: Vec<String> = order_by.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&cols.join(", "));
    }
    sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    sql
}

/// Multi-row INSERT from pre-rendered value tuples.
pub fn build_insert(database: &str, table: &str, columns: &[String], rows: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualify(database, table),
        cols.join(", "),
        rows.join(", ")
    )
}

pub fn build_delete_all(database: &str, table: &str) -> String {
    format!("DELETE FROM {}", qualify(database, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("my_table"), "`my_table`");
        assert_eq!(quote_ident("ta`ble"), "`ta``ble`");
    }

    #[test]
    fn qualify_joins_database_and_table() {
        assert_eq!(qualify("mydb", "users"), "`mydb`.`users`");
    }

    #[test]
    fn codec_classification() {
        assert_eq!(codec_for("int(11)"), ValueCodec::Numeric);
        assert_eq!(codec_for("bigint unsigned"), ValueCodec::Numeric);
        assert_eq!(codec_for("varchar(255)"), ValueCodec::Text);
        assert_eq!(codec_for("datetime"), ValueCodec::Text);
        assert_eq!(codec_for("decimal(10,2)"), ValueCodec::Text);
        assert_eq!(codec_for("blob"), ValueCodec::Hex);
        assert_eq!(codec_for("VARBINARY(64)"), ValueCodec::Hex);
    }

    #[test]
    fn select_expr_per_codec() {
        assert_eq!(select_expr("id", ValueCodec::Numeric), "`id`");
        assert_eq!(
            select_expr("name", ValueCodec::Text),
            "CONVERT(`name` USING utf8mb4) AS `name`"
        );
        assert_eq!(select_expr("payload", ValueCodec::Hex), "HEX(`payload`) AS `payload`");
    }

    #[test]
    fn literal_null_and_numbers() {
        assert_eq!(sql_literal(&Value::Null, ValueCodec::Text), "NULL");
        assert_eq!(sql_literal(&json!(42), ValueCodec::Numeric), "42");
        assert_eq!(sql_literal(&json!(19.99), ValueCodec::Numeric), "19.99");
    }

    #[test]
    fn literal_string_escapes_quotes_and_backslashes() {
        assert_eq!(
            sql_literal(&json!("it's fine"), ValueCodec::Text),
            "'it''s fine'"
        );
        assert_eq!(
            sql_literal(&json!(r"c:\tmp"), ValueCodec::Text),
            r"'c:\\tmp'"
        );
    }

    #[test]
    fn literal_hex_uses_x_notation() {
        assert_eq!(
            sql_literal(&json!("DEADBEEF"), ValueCodec::Hex),
            "X'DEADBEEF'"
        );
        assert_eq!(sql_literal(&Value::Null, ValueCodec::Hex), "NULL");
    }

    #[test]
    fn batch_select_with_filter_and_order() {
        let sql = build_batch_select(
            "src",
            "users",
            &["`id`".to_string(), "CONVERT(`name` USING utf8mb4) AS `name`".to_string()],
            &["id".to_string()],
            Some("id > 100"),
            200,
            100,
        );
        assert_eq!(
            sql,
            "SELECT `id`, CONVERT(`name` USING utf8mb4) AS `name` FROM `src`.`users` \
             WHERE id > 100 ORDER BY `id` LIMIT 100 OFFSET 200"
        );
    }

    #[test]
    fn batch_select_without_order_by() {
        let sql = build_batch_select("src", "t", &["`a`".to_string()], &[], None, 0, 50);
        assert!(!sql.contains("ORDER BY"));
        assert!(sql.ends_with("LIMIT 50 OFFSET 0"));
    }

    #[test]
    fn insert_joins_rows() {
        let sql = build_insert(
            "dst",
            "users",
            &["id".to_string(), "name".to_string()],
            &["(1, 'Alice')".to_string(), "(2, 'Bob')".to_string()],
        );
        assert_eq!(
            sql,
            "INSERT INTO `dst`.`users` (`id`, `name`) VALUES (1, 'Alice'), (2, 'Bob')"
        );
    }

    #[test]
    fn render_row_mixes_codecs() {
        let row = vec![json!(7), json!("O'Brien"), Value::Null];
        let codecs = vec![ValueCodec::Numeric, ValueCodec::Text, ValueCodec::Hex];
        assert_eq!(render_row(&row, &codecs), "(7, 'O''Brien', NULL)");
    }
}
