//! Arrow schema for the per-character memory tables in LanceDB.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// BGESmallENV15 embedding dimension.
pub const EMBEDDING_DIMENSION: i32 = 384;

/// Schema for `character_memory_{id}` tables.
///
/// The text is duplicated here so that a table can be inspected on its own;
/// the SQLite row stays authoritative for everything else.
pub fn character_memory_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("character_id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("importance", DataType::Float64, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                EMBEDDING_DIMENSION,
            ),
            false,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_memory_schema_fields() {
        let schema = character_memory_schema();
        assert_eq!(schema.fields().len(), 7);
        for name in ["id", "character_id", "content", "kind", "importance", "created_at"] {
            assert!(schema.field_with_name(name).is_ok(), "{name} missing");
        }

        let vector_field = schema.field_with_name("vector").unwrap();
        match vector_field.data_type() {
            DataType::FixedSizeList(_, size) => assert_eq!(*size, EMBEDDING_DIMENSION),
            other => panic!("Expected FixedSizeList, got {:?}", other),
        }
    }
}
