// src/search/vector.rs
// sqlite-vec KNN search over the `message_embeddings` virtual table (spec
// §4.7 semantic leg), grounded in the teacher's `vec_code` KNN query.

use rusqlite::{params, Connection};

/// `(message_id, cosine_distance)` — smaller distance is a better match.
pub type VectorHit = (i64, f32);

pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn distance_to_score(distance: f32) -> f32 {
    1.0 - distance.clamp(0.0, 2.0) / 2.0
}

pub fn search(
    conn: &Connection,
    query_vector: &[f32],
    channel_id: Option<i64>,
    limit: i64,
) -> rusqlite::Result<Vec<VectorHit>> {
    let bytes = embedding_to_bytes(query_vector);
    let mut stmt = conn.prepare(
        "SELECT e.message_id, vec_distance_cosine(e.embedding, ?1) as distance
         FROM message_embeddings e
         JOIN messages m ON m.id = e.message_id
         WHERE e.embedding MATCH ?1 AND k = ?3 AND (?2 IS NULL OR m.channel_id = ?2)
         ORDER BY distance",
    )?;
    let rows = stmt.query_map(params![bytes, channel_id, limit], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f32>(1)?))
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_score_monotonic() {
        assert!(distance_to_score(0.0) > distance_to_score(1.0));
        assert!(distance_to_score(1.0) > distance_to_score(2.0));
    }
}
