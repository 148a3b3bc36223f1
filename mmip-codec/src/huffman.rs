//! Canonical Huffman coding over `(run, value)` symbols.
//!
//! Code *lengths* are derived from symbol frequencies by the usual
//! tree-merge construction; the codes themselves are then assigned
//! canonically from the lengths alone (sorted by `(len, symbol_key)`), so a
//! transmitted table need only carry lengths, not codes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashMap;

use mmip_bitio::BitReader;

use crate::error::CodecError;
use crate::rle::Symbol;

struct TreeNode {
    freq: u32,
    sym: Option<Symbol>,
    left: Option<usize>,
    right: Option<usize>,
}

fn sym_key(sym: Symbol) -> (u8, u32) {
    let (run, value) = sym;
    (run, (value as i32 + 32768) as u32)
}

/// Builds a Huffman tree over the given frequencies (ties broken FIFO on
/// first-seen order) and returns each symbol's code length, clamped to a
/// minimum of 1.
pub fn build_code_lengths(symbols: &[Symbol]) -> Vec<(Symbol, u8)> {
    let mut order: Vec<Symbol> = Vec::new();
    let mut freq: HashMap<Symbol, u32> = HashMap::new();
    for &s in symbols {
        if let Some(c) = freq.get_mut(&s) {
            *c += 1;
        } else {
            freq.insert(s, 1);
            order.push(s);
        }
    }

    let mut arena: Vec<TreeNode> = order
        .iter()
        .map(|&s| TreeNode {
            freq: freq[&s],
            sym: Some(s),
            left: None,
            right: None,
        })
        .collect();

    // (freq, insertion-sequence) -> arena index, min-heap via Reverse.
    let mut heap: BinaryHeap<Reverse<(u32, u32, usize)>> = BinaryHeap::new();
    for (i, node) in arena.iter().enumerate() {
        heap.push(Reverse((node.freq, i as u32, i)));
    }
    let mut next_seq = arena.len() as u32;

    let root = if arena.len() == 1 {
        let dummy = arena.len();
        arena.push(TreeNode {
            freq: 0,
            sym: None,
            left: None,
            right: None,
        });
        let root_idx = arena.len();
        arena.push(TreeNode {
            freq: arena[0].freq,
            sym: None,
            left: Some(0),
            right: Some(dummy),
        });
        root_idx
    } else {
        loop {
            let Reverse((fa, _, a)) = heap.pop().expect("heap non-empty while >1 node remains");
            let Reverse((fb, _, b)) = heap.pop().expect("at least two nodes to merge");
            let combined = arena.len();
            arena.push(TreeNode {
                freq: fa + fb,
                sym: None,
                left: Some(a),
                right: Some(b),
            });
            if heap.is_empty() {
                break combined;
            }
            heap.push(Reverse((fa + fb, next_seq, combined)));
            next_seq += 1;
        }
    };

    let mut lengths = Vec::with_capacity(order.len());
    let mut stack = vec![(root, 0u32)];
    while let Some((idx, depth)) = stack.pop() {
        let node = &arena[idx];
        if let Some(sym) = node.sym {
            lengths.push((sym, depth.max(1) as u8));
            continue;
        }
        if let Some(l) = node.left {
            stack.push((l, depth + 1));
        }
        if let Some(r) = node.right {
            stack.push((r, depth + 1));
        }
    }
    lengths
}

/// Assigns canonical `(code, length)` pairs from code lengths alone.
pub fn canonical_codes_from_lengths(lengths: &[(Symbol, u8)]) -> HashMap<Symbol, (u32, u8)> {
    let mut items: Vec<(Symbol, u8)> = lengths.to_vec();
    items.sort_by_key(|&(sym, len)| (len, sym_key(sym)));

    let mut out = HashMap::with_capacity(items.len());
    let mut code: u32 = 0;
    let mut prev_len: u8 = 0;
    for (sym, len) in items {
        code <<= len - prev_len;
        out.insert(sym, (code, len));
        code += 1;
        prev_len = len;
    }
    out
}

/// Binary decode trie over flat arrays, `-1` as the absent-child sentinel.
pub struct DecodeTrie {
    left: Vec<i32>,
    right: Vec<i32>,
    symbol: Vec<Option<Symbol>>,
}

impl DecodeTrie {
    pub fn build(codes: &HashMap<Symbol, (u32, u8)>) -> Self {
        let mut trie = DecodeTrie {
            left: vec![-1],
            right: vec![-1],
            symbol: vec![None],
        };
        for (&sym, &(code, len)) in codes {
            let mut cur = 0usize;
            for i in (0..len).rev() {
                let bit = (code >> i) & 1;
                let child = if bit == 0 { trie.left[cur] } else { trie.right[cur] };
                cur = if child >= 0 {
                    child as usize
                } else {
                    let new_idx = trie.left.len();
                    trie.left.push(-1);
                    trie.right.push(-1);
                    trie.symbol.push(None);
                    if bit == 0 {
                        trie.left[cur] = new_idx as i32;
                    } else {
                        trie.right[cur] = new_idx as i32;
                    }
                    new_idx
                };
            }
            trie.symbol[cur] = Some(sym);
        }
        trie
    }

    pub fn decode_one(&self, reader: &mut BitReader) -> Result<Symbol, CodecError> {
        let mut cur = 0usize;
        loop {
            if let Some(sym) = self.symbol[cur] {
                return Ok(sym);
            }
            let bit = reader.read_bit()?;
            let child = if bit == 0 { self.left[cur] } else { self.right[cur] };
            if child < 0 {
                return Err(CodecError::InvalidCode);
            }
            cur = child as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmip_bitio::BitWriter;

    #[test]
    fn self_consistent_roundtrip() {
        let symbols: Vec<Symbol> = vec![
            (0, 1), (0, 1), (0, 1), (0, 1), (0, 1),
            (1, 2), (1, 2), (1, 2),
            (3, -4), (3, -4),
            (0, 0),
        ];
        let lengths = build_code_lengths(&symbols);
        let codes = canonical_codes_from_lengths(&lengths);
        assert!(codes.len() >= 2);

        // Prefix-free: no code is a prefix of another equal-or-longer code
        // sharing the same leading bits (verified implicitly by a trie
        // roundtrip of every symbol).
        for &sym in codes.keys() {
            let (code, len) = codes[&sym];
            let mut w = BitWriter::new();
            w.write_code(code, len);
            let bytes = w.finish();
            let trie = DecodeTrie::build(&codes);
            let mut r = BitReader::new(&bytes);
            let decoded = trie.decode_one(&mut r).unwrap();
            assert_eq!(decoded, sym);
        }
    }

    #[test]
    fn single_symbol_gets_length_one() {
        let symbols = vec![(0u8, 5i16); 10];
        let lengths = build_code_lengths(&symbols);
        assert_eq!(lengths.len(), 1);
        assert_eq!(lengths[0].1, 1);

        let codes = canonical_codes_from_lengths(&lengths);
        let trie = DecodeTrie::build(&codes);
        let (code, len) = codes[&(0, 5)];
        let mut w = BitWriter::new();
        w.write_code(code, len);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(trie.decode_one(&mut r).unwrap(), (0, 5));
    }

    #[test]
    fn invalid_code_is_rejected() {
        // Explicit 2-symbol table: 0 -> 'a' (len 1), 10 -> 'b' (len 2).
        // "11" descends right-then-right, which has no entry.
        let mut codes: HashMap<Symbol, (u32, u8)> = HashMap::new();
        codes.insert((0, 1), (0b0, 1));
        codes.insert((0, 2), (0b10, 2));
        let trie = DecodeTrie::build(&codes);

        let mut w = BitWriter::new();
        w.write_code(0b11, 2);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert!(matches!(trie.decode_one(&mut r), Err(CodecError::InvalidCode)));
    }

    #[test]
    fn codes_are_canonical_and_sorted_by_length() {
        let symbols: Vec<Symbol> = vec![
            (0, 1), (0, 1), (0, 1), (0, 1),
            (1, 2), (1, 2),
            (2, 3),
        ];
        let lengths = build_code_lengths(&symbols);
        let codes = canonical_codes_from_lengths(&lengths);
        // the most frequent symbol should not be longer than the least frequent
        let len_of = |s: Symbol| codes[&s].1;
        assert!(len_of((0, 1)) <= len_of((2, 3)));
    }
}
