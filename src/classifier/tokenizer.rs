//! WordPiece tokenizer for the uncased vocabulary shipped with a checkpoint.
//!
//! Text is lowercased, split on whitespace and punctuation, then each word is
//! broken into the longest vocabulary pieces (`##` marks a continuation).
//! Sequences are framed as `[CLS] ... [SEP]`, truncated on the right and
//! padded to a fixed width so every input has the same shape.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ClassifierError;

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";

/// Words longer than this map straight to `[UNK]`.
const MAX_CHARS_PER_WORD: usize = 100;

/// Fixed-width model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput {
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<u8>,
}

impl TokenizedInput {
    /// Number of non-padding positions.
    pub fn real_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// Maps text to fixed-width numeric input.
pub trait Tokenize: Send + Sync {
    fn encode(&self, text: &str, max_length: usize) -> Result<TokenizedInput, ClassifierError>;
}

/// Greedy longest-match-first WordPiece tokenizer.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: HashMap<String, u32>,
    /// Number of id slots, i.e. vocabulary lines. Exceeds `vocab.len()` when
    /// lines repeat.
    id_count: usize,
    cls_id: u32,
    sep_id: u32,
    pad_id: u32,
    unk_id: u32,
}

impl WordPieceTokenizer {
    /// Build from tokens ordered by id.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = HashMap::new();
        let mut id_count = 0;
        for (id, token) in tokens.into_iter().enumerate() {
            id_count = id + 1;
            let id = u32::try_from(id).map_err(|_| ClassifierError::ModelUnavailable {
                reason: "vocabulary exceeds u32 ids".into(),
            })?;
            // First occurrence wins, matching line-number ids.
            vocab.entry(token.into()).or_insert(id);
        }

        let special = |token: &str| {
            vocab
                .get(token)
                .copied()
                .ok_or_else(|| ClassifierError::ModelUnavailable {
                    reason: format!("vocabulary is missing special token {token}"),
                })
        };

        Ok(Self {
            cls_id: special(CLS_TOKEN)?,
            sep_id: special(SEP_TOKEN)?,
            pad_id: special(PAD_TOKEN)?,
            unk_id: special(UNK_TOKEN)?,
            vocab,
            id_count,
        })
    }

    /// Load a `vocab.txt` file (one token per line, line number = id).
    pub fn from_vocab_file(path: &Path) -> Result<Self, ClassifierError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ClassifierError::ModelUnavailable {
                reason: format!("failed to read vocabulary {}: {e}", path.display()),
            })?;
        Self::from_tokens(contents.lines().map(|l| l.trim_end_matches('\r')))
    }

    /// One past the highest token id, which the embedding table must cover.
    pub fn vocab_size(&self) -> usize {
        self.id_count
    }

    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    /// Split text into WordPiece ids, without framing or truncation.
    pub fn tokenize(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::new();
        for word in basic_split(text) {
            self.word_pieces(&word, &mut ids);
        }
        ids
    }

    fn word_pieces(&self, word: &str, out: &mut Vec<u32>) {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > MAX_CHARS_PER_WORD {
            out.push(self.unk_id);
            return;
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while start < end {
                let mut candidate: String = chars[start..end].iter().collect();
                if start > 0 {
                    candidate.insert_str(0, "##");
                }
                if let Some(&id) = self.vocab.get(&candidate) {
                    found = Some(id);
                    break;
                }
                end -= 1;
            }
            match found {
                Some(id) => {
                    pieces.push(id);
                    start = end;
                }
                None => {
                    // One unmatched span poisons the whole word.
                    out.push(self.unk_id);
                    return;
                }
            }
        }
        out.extend(pieces);
    }
}

impl Tokenize for WordPieceTokenizer {
    fn encode(&self, text: &str, max_length: usize) -> Result<TokenizedInput, ClassifierError> {
        if max_length < 3 {
            return Err(ClassifierError::Inference {
                reason: format!("max_length {max_length} leaves no room for tokens"),
            });
        }

        let mut pieces = self.tokenize(text);
        let budget = max_length - 2;
        if pieces.len() > budget {
            tracing::debug!(
                "Truncating input from {} to {} word pieces",
                pieces.len(),
                budget
            );
            pieces.truncate(budget);
        }

        let mut input_ids = Vec::with_capacity(max_length);
        input_ids.push(self.cls_id);
        input_ids.extend(pieces);
        input_ids.push(self.sep_id);

        let real = input_ids.len();
        let mut attention_mask = vec![1u8; real];
        input_ids.resize(max_length, self.pad_id);
        attention_mask.resize(max_length, 0);

        Ok(TokenizedInput {
            input_ids,
            attention_mask,
        })
    }
}

/// Lowercase, fold accents and split on whitespace, isolating each
/// punctuation character and CJK ideograph.
///
/// Accent folding covers Latin-1, Latin Extended-A and combining marks;
/// letters outside those blocks keep their accents.
fn basic_split(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch == '\0' || ch == '\u{fffd}' || is_combining_mark(ch) {
            continue;
        }
        let ch = fold_accent(ch);
        if ch.is_whitespace() || ch.is_control() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if is_punctuation(ch) || is_cjk(ch) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(ch.to_string());
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Every printable ASCII non-alphanumeric counts, symbols included. Outside
/// ASCII only the punctuation blocks count, so `€` or `©` stay in a word.
fn is_punctuation(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_punctuation();
    }
    matches!(
        ch as u32,
        0xA1 | 0xA7 | 0xAB | 0xB6 | 0xB7 | 0xBB | 0xBF
            | 0x2010..=0x2027
            | 0x2030..=0x2043
            | 0x2045..=0x2051
            | 0x2053..=0x205E
            | 0x3001..=0x3003
            | 0x3008..=0x3011
            | 0x3014..=0x301F
            | 0xFF01..=0xFF03
            | 0xFF05..=0xFF0A
            | 0xFF0C..=0xFF0F
            | 0xFF1A..=0xFF1B
            | 0xFF1F..=0xFF20
            | 0xFF3B..=0xFF3D
            | 0xFF3F
            | 0xFF5B
            | 0xFF5D
    )
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

fn is_combining_mark(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Base letter of a lowercase precomposed Latin letter.
fn fold_accent(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}
