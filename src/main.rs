use std::{cell::RefCell, collections::BTreeMap, error, fs, path::PathBuf, rc::Rc};

use clap::Parser;
use isa::decoder::{Category, Decoder, DecoderObserver, Instruction, Isa};
use logger::{LogKind, init_logger};

/// armkit - A64/C64 instruction classifier
#[derive(Parser, Debug)]
#[command(name = "armkit", version, about = "Classifies A64 and C64 instruction words")]
struct Args {
    /// Raw little-endian code to decode.
    input: Option<PathBuf>,

    /// Instruction word in hex, decoded after the input file. Repeatable.
    #[arg(short, long = "word", value_parser = parse_word)]
    words: Vec<u32>,

    /// Instruction set in effect at offset 0.
    #[arg(long, default_value_t = Isa::A64)]
    isa: Isa,

    /// Instruction-set switch as OFFSET=ISA, with OFFSET in bytes. Repeatable.
    #[arg(long = "switch", value_parser = parse_switch)]
    switches: Vec<(usize, Isa)>,

    /// Log to a file in the temp directory instead of stdout.
    #[arg(long)]
    log_file: bool,
}

fn parse_number(text: &str) -> Result<u64, String> {
    let text = text.trim().replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("`{text}`: {e}"))
}

fn parse_word(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    u32::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| format!("`{text}`: {e}"))
}

fn parse_switch(text: &str) -> Result<(usize, Isa), String> {
    let (offset, isa) = text
        .split_once('=')
        .ok_or_else(|| format!("`{text}`: expected OFFSET=ISA"))?;
    let offset = usize::try_from(parse_number(offset)?).map_err(|e| format!("`{text}`: {e}"))?;
    Ok((offset, isa.parse()?))
}

/// Prints one line per instruction and counts the words the graph could
/// not classify.
#[derive(Default)]
struct Listing {
    decoded: usize,
    unallocated: usize,
    unimplemented: usize,
}

impl DecoderObserver for Listing {
    fn visit(&mut self, instruction: &Instruction) {
        println!(
            "{:08x}: {:08x}  {}",
            instruction.offset, instruction.word, instruction.category
        );
        self.decoded += 1;
        match instruction.category {
            Category::Unallocated => self.unallocated += 1,
            Category::Unimplemented => self.unimplemented += 1,
            _ => {}
        }
    }

    fn set_isa(&mut self, isa: Isa) {
        tracing::debug!(%isa, "listing switched instruction set");
    }
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let args = Args::parse();

    let kind = if args.log_file { LogKind::FILE } else { LogKind::STDOUT };
    let guard = init_logger(kind);
    if let Some(path) = guard.as_ref().and_then(|guard| guard.path()) {
        eprintln!("Logging to file: {}", path.display());
    }

    let mut bytes = match &args.input {
        Some(path) => fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => Vec::new(),
    };
    if bytes.len() % 4 != 0 {
        tracing::warn!(len = bytes.len(), "input is not a whole number of words");
        bytes.truncate(bytes.len() - bytes.len() % 4);
    }
    bytes.extend(args.words.iter().flat_map(|word| word.to_le_bytes()));

    if bytes.is_empty() {
        return Err("nothing to decode: pass an input file or --word".into());
    }

    let mut switches: BTreeMap<usize, Isa> = args.switches.iter().copied().collect();
    switches.entry(0).or_insert(args.isa);

    let listing = Rc::new(RefCell::new(Listing::default()));
    let mut decoder = Decoder::new();
    decoder.append_observer(listing.clone());
    decoder.decode_range(&bytes, Some(&switches));

    let listing = listing.borrow();
    println!(
        "{} instructions, {} unallocated, {} unimplemented",
        listing.decoded, listing.unallocated, listing.unimplemented
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn words_accept_optional_prefix() {
        assert_eq!(parse_word("0xd65f03c0"), Ok(0xD65F_03C0));
        assert_eq!(parse_word("D503_201F"), Ok(0xD503_201F));
        assert!(parse_word("0x1_0000_0000").is_err());
    }

    #[test]
    fn switches() {
        assert_eq!(parse_switch("0x10=c64"), Ok((16, Isa::C64)));
        assert_eq!(parse_switch("8=A64"), Ok((8, Isa::A64)));
        assert!(parse_switch("8").is_err());
        assert!(parse_switch("8=thumb").is_err());
    }

    #[test]
    fn arguments() {
        let args = Args::parse_from(["armkit", "-w", "0xd65f03c0", "--switch", "4=c64", "--isa", "c64"]);
        assert_eq!(args.words, vec![0xD65F_03C0]);
        assert_eq!(args.switches, vec![(4, Isa::C64)]);
        assert_eq!(args.isa, Isa::C64);
        assert!(args.input.is_none());
    }
}
