//! A minimal shaping driver: prints the glyphs for a text run.
//!
//! Usage:
//!   shape font.ttf "some text" [--features "smcp,-liga"]
//!       [--direction ltr] [--script Latn] [--language en]
//!       [--variations "wght=700"] [--no-glyph-names] [--no-positions]

use std::str::FromStr;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();

    let features: Vec<textshape::Feature> = match args.opt_value_from_str::<_, String>("--features")? {
        Some(list) => list
            .split(',')
            .map(|s| textshape::Feature::from_str(s.trim()))
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };

    let variations: Vec<textshape::Variation> =
        match args.opt_value_from_str::<_, String>("--variations")? {
            Some(list) => list
                .split(',')
                .map(|s| textshape::Variation::from_str(s.trim()))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

    let direction: Option<textshape::Direction> = args.opt_value_from_str("--direction")?;
    let script: Option<textshape::Script> = args.opt_value_from_str("--script")?;
    let language: Option<textshape::Language> = args.opt_value_from_str("--language")?;

    let mut serialize_flags = textshape::SerializeFlags::default();
    if args.contains("--no-glyph-names") {
        serialize_flags |= textshape::SerializeFlags::NO_GLYPH_NAMES;
    }
    if args.contains("--no-positions") {
        serialize_flags |= textshape::SerializeFlags::NO_POSITIONS;
    }
    if args.contains("--no-clusters") {
        serialize_flags |= textshape::SerializeFlags::NO_CLUSTERS;
    }
    if args.contains("--show-flags") {
        serialize_flags |= textshape::SerializeFlags::GLYPH_FLAGS;
    }

    let font_path: std::path::PathBuf = args.free_from_str()?;
    let text: String = args.free_from_str()?;

    let blob = textshape::Blob::from_file(&font_path)?;
    let face = textshape::Face::from_blob(&blob, 0)?;
    let mut font = textshape::Font::new(&face);
    if !variations.is_empty() {
        font.set_variations(&variations);
    }

    let mut buffer = textshape::UnicodeBuffer::new();
    buffer.push_str(&text);
    if let Some(direction) = direction {
        buffer.set_direction(direction);
    }
    if let Some(script) = script {
        buffer.set_script(script);
    }
    if let Some(language) = language {
        buffer.set_language(language);
    }

    let glyphs = textshape::shape(&font, &features, buffer);
    println!("{}", glyphs.serialize(&face, serialize_flags));

    Ok(())
}
