#![no_main]

use arbitrary::Arbitrary;
use brainy_db::noun::NewNoun;
use brainy_db::query::{QueryOptions, QueryTarget};
use brainy_db::{BrainyDb, Config};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    seed_vectors: Vec<Vec<f32>>,
    query_vector: Vec<f32>,
    limit: u8,
    offset: u8,
}

fuzz_target!(|input: Input| {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::ephemeral();
    let db = BrainyDb::open(dir.path(), config).unwrap();

    for vector in input.seed_vectors.into_iter().take(32) {
        let _ = db.add_noun(NewNoun { vector: Some(vector), ..Default::default() });
    }

    let mut options = QueryOptions::from_config(&db.config().query);
    options.limit = (input.limit as usize).max(1);
    options.offset = input.offset as usize;

    // A malformed or out-of-range query vector must surface as an error,
    // never a panic.
    let _ = db.search(QueryTarget::Vector(input.query_vector), options);
});
