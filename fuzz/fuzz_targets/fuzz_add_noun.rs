#![no_main]

use arbitrary::Arbitrary;
use brainy_db::noun::{NewNoun, NounType};
use brainy_db::{BrainyDb, Config};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    vector: Vec<f32>,
    content: Option<String>,
    type_selector: u8,
}

fn noun_type(selector: u8) -> NounType {
    match selector % 10 {
        0 => NounType::Person,
        1 => NounType::Organization,
        2 => NounType::Document,
        3 => NounType::Event,
        4 => NounType::Concept,
        5 => NounType::Thing,
        6 => NounType::Place,
        7 => NounType::Skill,
        8 => NounType::Tool,
        _ => NounType::Project,
    }
}

fuzz_target!(|input: Input| {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::ephemeral();
    let db = BrainyDb::open(dir.path(), config).unwrap();

    let new_noun = NewNoun {
        noun_type: noun_type(input.type_selector),
        vector: Some(input.vector),
        content: input.content,
        ..Default::default()
    };

    // Any outcome is acceptable as long as this never panics: dimension
    // mismatches and missing-vector-and-content are validation errors,
    // not bugs.
    let _ = db.add_noun(new_noun);
});
