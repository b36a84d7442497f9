//! Converts the string form of tokenizer tokens back into the raw bytes they stand for.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;
use tokenizers::{DecoderWrapper, Tokenizer};

use crate::{Error, Result};

/// GPT-2 byte level encoding: printable bytes map to themselves, every other byte is shifted
/// past `U+00FF`, in byte order.
static CHAR_MAP: Lazy<HashMap<char, u8>> = Lazy::new(|| {
    let mut char_map = HashMap::with_capacity_and_hasher(256, Default::default());
    let mut key = 0x100u32;
    for byte in 0..=255u8 {
        let char = byte as char;
        if matches!(char, '!'..='~' | '\u{A1}'..='\u{AC}' | '\u{AE}'..='\u{FF}') {
            char_map.insert(char, byte);
        } else if let Some(shifted) = char::from_u32(key) {
            char_map.insert(shifted, byte);
            key += 1;
        }
    }
    char_map
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenProcessorLevel {
    /// `ByteLevel` decoder, as in GPT-2.
    Byte,
    /// SentencePiece style `ByteFallback` decoder with `<0xNN>` tokens, `spacechar` stands for a
    /// space.
    ByteFallback { spacechar: char },
}

#[derive(Debug)]
pub(crate) struct TokenProcessor {
    level: TokenProcessorLevel,
}

/// Serialized shape of `tokenizers`' `Replace` decoder, whose fields are private.
#[derive(Debug, Deserialize)]
struct ReplaceDecoder {
    content: String,
    pattern: ReplacePattern,
}

#[derive(Debug, Deserialize)]
enum ReplacePattern {
    String(String),
}

impl ReplaceDecoder {
    /// The replaced character when the decoder turns it into a space.
    fn space_replacement(&self) -> Option<char> {
        if self.content != " " {
            return None;
        }
        let ReplacePattern::String(pattern) = &self.pattern;
        let mut chars = pattern.chars();
        match (chars.next(), chars.next()) {
            (Some(replacement), None) => Some(replacement),
            _ => None,
        }
    }
}

impl TokenProcessor {
    pub(crate) fn new(tokenizer: &Tokenizer) -> Result<Self> {
        match tokenizer.get_decoder() {
            Some(DecoderWrapper::ByteLevel(_)) => Ok(Self {
                level: TokenProcessorLevel::Byte,
            }),
            Some(DecoderWrapper::Sequence(decoding_sequence)) => {
                let mut is_byte_fallback = false;
                let mut spacechar = ' ';

                for decoder in decoding_sequence.get_decoders() {
                    match decoder {
                        DecoderWrapper::ByteFallback(_) => is_byte_fallback = true,
                        DecoderWrapper::Replace(replace) => {
                            let value = serde_json::to_value(replace)
                                .map_err(|_| Error::DecoderUnpackingFailed)?;
                            let replace: ReplaceDecoder = serde_json::from_value(value)
                                .map_err(|_| Error::DecoderUnpackingFailed)?;
                            if let Some(replacement) = replace.space_replacement() {
                                spacechar = replacement
                            }
                        }
                        _ => {}
                    }
                }

                if is_byte_fallback {
                    Ok(Self {
                        level: TokenProcessorLevel::ByteFallback { spacechar },
                    })
                } else {
                    Err(Error::UnsupportedByTokenProcessor)
                }
            }
            _ => Err(Error::UnsupportedByTokenProcessor),
        }
    }

    /// Raw bytes of a token.
    pub(crate) fn process(&self, token: &str) -> Result<Vec<u8>> {
        match self.level {
            TokenProcessorLevel::Byte => token
                .chars()
                .map(|char| {
                    CHAR_MAP
                        .get(&char)
                        .copied()
                        .ok_or(Error::ByteProcessorFailed)
                })
                .collect(),
            TokenProcessorLevel::ByteFallback { spacechar } => {
                if token.len() == 6 && token.starts_with("<0x") && token.ends_with('>') {
                    u8::from_str_radix(&token[3..5], 16)
                        .map(|byte| vec![byte])
                        .map_err(|_| Error::ByteFallbackProcessorFailed)
                } else {
                    Ok(token.replace(spacechar, " ").into_bytes())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_level() {
        let processor = TokenProcessor {
            level: TokenProcessorLevel::Byte,
        };
        for (token, bytes) in [
            ("abc", b"abc".to_vec()),
            ("Ġal", b" al".to_vec()),
            ("Ċ", b"\n".to_vec()),
            ("ÿ", vec![0xFF]),
            ("Ã©", "é".as_bytes().to_vec()),
        ] {
            assert_eq!(processor.process(token).expect("Not processed"), bytes);
        }
        assert!(matches!(
            processor.process("💩"),
            Err(Error::ByteProcessorFailed)
        ));
    }

    #[test]
    fn byte_fallback_level() {
        let processor = TokenProcessor {
            level: TokenProcessorLevel::ByteFallback { spacechar: '▁' },
        };
        for (token, bytes) in [
            ("abc", b"abc".to_vec()),
            ("▁al", b" al".to_vec()),
            ("▁▁", b"  ".to_vec()),
            ("<0x0A>", vec![0x0A]),
            ("<0xFF>", vec![0xFF]),
            ("<0x20>", b" ".to_vec()),
        ] {
            assert_eq!(processor.process(token).expect("Not processed"), bytes);
        }
        assert!(matches!(
            processor.process("<0xZZ>"),
            Err(Error::ByteFallbackProcessorFailed)
        ));
    }

    #[test]
    fn unsupported_tokenizer() {
        let model = "hf-internal-testing/tiny-random-XLMRobertaXLForCausalLM";
        let tokenizer = Tokenizer::from_pretrained(model, None).expect("Tokenizer failed");
        assert!(matches!(
            TokenProcessor::new(&tokenizer),
            Err(Error::UnsupportedByTokenProcessor)
        ));
    }
}
