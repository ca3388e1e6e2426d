use huffcode::bitio::{BitReader, BitWriter};
use huffcode::codec::{
    codebook_path_for, compress_file, decompress_file, CodecError, DecompressOptions,
};
use huffcode::code_tree::ByteSink;
use huffcode::frequency::count_symbols;
use huffcode::{CodeTree, Codebook, DecodeStatus, Encoder, Symbol, EOF_SYMBOL};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tempfile::TempDir;

fn random_frequencies(rng: &mut SmallRng, alphabet: usize) -> Vec<u64> {
    (0..alphabet)
        .map(|_| {
            if rng.gen_bool(0.3) {
                0
            } else {
                rng.gen_range(1..1000)
            }
        })
        .collect()
}

/// Cost of an optimal prefix code: the sum of all merged weights, found by
/// repeatedly combining the two smallest weights of a sorted list.
fn optimal_cost(weights: &[u64]) -> u64 {
    let mut weights = weights.iter().copied().filter(|&w| w > 0).collect::<Vec<_>>();
    let mut cost = 0;

    while weights.len() > 1 {
        weights.sort_unstable_by(|a, b| b.cmp(a));
        let (Some(a), Some(b)) = (weights.pop(), weights.pop()) else {
            break;
        };
        cost += a + b;
        weights.push(a + b);
    }

    cost
}

fn with_eof(frequencies: &[u64], eof: Symbol) -> Vec<u64> {
    let mut table = frequencies.to_vec();
    if table.len() <= eof as usize {
        table.resize(eof as usize + 1, 0);
    }
    if table[eof as usize] == 0 {
        table[eof as usize] = 1;
    }
    table
}

#[test]
fn codebook_is_stable_under_reconstruction() {
    let mut rng = SmallRng::seed_from_u64(7);

    for _ in 0..50 {
        let frequencies = random_frequencies(&mut rng, 256);
        let tree = CodeTree::build(&frequencies, EOF_SYMBOL).unwrap();
        let codebook = tree.codebook();

        let mut text = Vec::<u8>::new();
        codebook.write_to(&mut text).unwrap();
        let parsed = Codebook::read_from(text.as_slice()).unwrap();
        parsed.validate().unwrap();

        let rebuilt = CodeTree::from_codebook(&parsed);
        assert_eq!(rebuilt.codebook(), codebook);
        assert!(rebuilt.is_complete());
    }
}

#[test]
fn decoding_inverts_encoding() {
    let mut rng = SmallRng::seed_from_u64(11);

    for round in 0..30 {
        let alphabet = rng.gen_range(1..40);
        let symbols = (0..rng.gen_range(0..500))
            .map(|_| rng.gen_range(0..alphabet))
            .collect::<Vec<Symbol>>();
        let eof = alphabet;

        let tree = CodeTree::build(&count_symbols(symbols.iter().copied()), eof).unwrap();
        let encoder = Encoder::new(&tree.codebook(), eof).unwrap();

        let mut bits = Vec::<bool>::new();
        encoder.encode_all(symbols.iter().copied(), &mut bits).unwrap();
        encoder.finish(&mut bits).unwrap();

        let mut source = bits.into_iter().collect::<VecDeque<_>>();
        let mut decoded = Vec::<Symbol>::new();
        let status = tree.decode(&mut source, &mut decoded, eof).unwrap();

        assert_eq!(status, DecodeStatus::Complete, "round {round}");
        assert_eq!(decoded, symbols, "round {round}");
        assert!(source.is_empty());
    }
}

#[test]
fn codes_are_prefix_free() {
    let mut rng = SmallRng::seed_from_u64(3);

    for _ in 0..20 {
        let frequencies = random_frequencies(&mut rng, 64);
        let codebook = CodeTree::build(&frequencies, 64).unwrap().codebook();

        for a in &codebook {
            for b in &codebook {
                if a.symbol != b.symbol {
                    assert!(!b.code.starts_with(&a.code));
                }
            }
        }
    }
}

#[test]
fn weighted_length_is_optimal() {
    let mut rng = SmallRng::seed_from_u64(5);

    for _ in 0..50 {
        // Small ranges make ties frequent.
        let frequencies = (0..rng.gen_range(0..30))
            .map(|_| rng.gen_range(0..4))
            .collect::<Vec<u64>>();
        let eof = frequencies.len() as Symbol;

        let tree = CodeTree::build(&frequencies, eof).unwrap();
        let table = with_eof(&frequencies, eof);

        assert_eq!(tree.codebook().weighted_length(&table), Some(optimal_cost(&table)));
    }
}

#[test]
fn bytes_survive_bit_packing() {
    let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
    let tree = CodeTree::from_bytes(&data).unwrap();
    let encoder = Encoder::new(&tree.codebook(), EOF_SYMBOL).unwrap();

    let mut packed = Vec::<u8>::new();
    {
        let mut writer = BitWriter::new(&mut packed);
        encoder
            .encode_all(data.iter().map(|&byte| byte as Symbol), &mut writer)
            .unwrap();
        encoder.finish(&mut writer).unwrap();
        writer.finish().unwrap();
    }
    assert!(packed.len() < data.len());

    let mut sink = ByteSink::new(Vec::<u8>::new());
    let status = tree
        .decode(&mut BitReader::new(packed.as_slice()), &mut sink, EOF_SYMBOL)
        .unwrap();

    assert_eq!(status, DecodeStatus::Complete);
    assert_eq!(sink.into_inner(), data);
}

#[test]
fn files_round_trip() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input.bin");
    let compressed = temp.path().join("input.huff");
    let restored = temp.path().join("restored.bin");

    let mut rng = SmallRng::seed_from_u64(13);
    let data = (0..10_000)
        .map(|_| {
            // Skewed distribution so the output is smaller than the input.
            let roll: u8 = rng.gen_range(0..16);
            if roll < 12 {
                b'a' + roll
            } else {
                rng.gen()
            }
        })
        .collect::<Vec<u8>>();
    std::fs::write(&input, &data).unwrap();

    let codebook = codebook_path_for(&compressed);
    let compress_summary = compress_file(&input, &compressed, &codebook).unwrap();
    assert!(codebook.exists());
    assert!(std::fs::metadata(&compressed).unwrap().len() < data.len() as u64);

    let decompress_summary =
        decompress_file(&compressed, &codebook, &restored, DecompressOptions::default()).unwrap();

    assert_eq!(decompress_summary.status, DecodeStatus::Complete);
    assert_eq!(decompress_summary.crc32, compress_summary.crc32);
    assert_eq!(std::fs::read(&restored).unwrap(), data);
}

#[test]
fn empty_file_round_trips() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("empty");
    let compressed = temp.path().join("empty.huff");
    let codebook = temp.path().join("empty.code");
    let restored = temp.path().join("empty.out");
    std::fs::write(&input, b"").unwrap();

    compress_file(&input, &compressed, &codebook).unwrap();
    assert_eq!(std::fs::read(&compressed).unwrap(), Vec::<u8>::new());
    assert_eq!(std::fs::read_to_string(&codebook).unwrap(), "256\n\n");

    let summary =
        decompress_file(&compressed, &codebook, &restored, DecompressOptions::default()).unwrap();
    assert_eq!(summary.status, DecodeStatus::Complete);
    assert_eq!(summary.output_bytes, 0);
}

#[test]
fn truncated_file_output_depends_on_allow_truncated() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input.txt");
    let compressed = temp.path().join("input.huff");
    let codebook = temp.path().join("input.huff.code");
    let restored = temp.path().join("restored.txt");

    std::fs::write(&input, b"mississippi").unwrap();
    compress_file(&input, &compressed, &codebook).unwrap();

    let mut bytes = std::fs::read(&compressed).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&compressed, &bytes).unwrap();

    let err = decompress_file(&compressed, &codebook, &restored, DecompressOptions::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::Truncated { pending_bits: 1, .. }));
    assert!(!restored.exists());

    let options = DecompressOptions {
        allow_truncated: true,
        ..DecompressOptions::default()
    };
    let summary = decompress_file(&compressed, &codebook, &restored, options).unwrap();
    assert_eq!(summary.status, DecodeStatus::Truncated { pending_bits: 1 });
    assert_eq!(std::fs::read(&restored).unwrap(), b"mississ");
}
