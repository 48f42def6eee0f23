#![no_main]

use arbitrary::Arbitrary;
use brainy_db::noun::NewNoun;
use brainy_db::verb::{NewVerb, VerbType};
use brainy_db::{BrainyDb, Config};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    source_vector: Vec<f32>,
    target_vector: Vec<f32>,
    weight: Option<f32>,
    confidence: Option<f32>,
    type_selector: u8,
}

fn verb_type(selector: u8) -> VerbType {
    match selector % 10 {
        0 => VerbType::RelatedTo,
        1 => VerbType::Supports,
        2 => VerbType::Contradicts,
        3 => VerbType::Elaborates,
        4 => VerbType::Supersedes,
        5 => VerbType::Implies,
        6 => VerbType::Causes,
        7 => VerbType::Requires,
        8 => VerbType::PartOf,
        _ => VerbType::MemberOf,
    }
}

fuzz_target!(|input: Input| {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::ephemeral();
    let db = BrainyDb::open(dir.path(), config).unwrap();

    let source_id = match db.add_noun(NewNoun { vector: Some(input.source_vector), ..Default::default() }) {
        Ok(id) => id,
        Err(_) => return,
    };
    let target_id = match db.add_noun(NewNoun { vector: Some(input.target_vector), ..Default::default() }) {
        Ok(id) => id,
        Err(_) => return,
    };

    // Out-of-range weight/confidence and self-referential edges must be
    // rejected as validation errors, never panic the facade.
    let _ = db.add_verb(NewVerb {
        source_id,
        target_id,
        verb_type: verb_type(input.type_selector),
        weight: input.weight,
        confidence: input.confidence,
        vector: None,
        properties: Default::default(),
    });
});
