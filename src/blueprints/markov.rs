//! Markov chain name generator.

use std::collections::BTreeMap;

use rand::Rng;

use crate::core::config::MAX_CHAIN_LENGTH;
use crate::core::error::ConfigError;

const END: char = '\n';

/// Character-level Markov chain trained on a word list.
///
/// Each prefix of `chain_len` characters maps to the characters that followed
/// it in the training data, with repeats preserved so frequent successors are
/// picked more often.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovChain {
    chain: BTreeMap<String, Vec<char>>,
    chain_len: usize,
    max_length: usize,
}

impl MarkovChain {
    pub fn new<I, S>(words: I, chain_len: usize, max_length: usize) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !(1..=MAX_CHAIN_LENGTH).contains(&chain_len) {
            return Err(ConfigError::Invalid(format!(
                "chain length must be between 1 and {}, got {}",
                MAX_CHAIN_LENGTH, chain_len
            )));
        }
        let mut chain = Self {
            chain: BTreeMap::new(),
            chain_len,
            max_length,
        };
        chain.train(words);
        Ok(chain)
    }

    /// Add more words to the chain
    pub fn train<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let padded: Vec<char> = std::iter::repeat(' ')
                .take(self.chain_len)
                .chain(word.as_ref().chars())
                .collect();
            let len = padded.len() - self.chain_len;
            for i in 0..len {
                let prefix: String = padded[i..i + self.chain_len].iter().collect();
                self.chain.entry(prefix).or_default().push(padded[i + self.chain_len]);
            }
            let tail: String = padded[len..].iter().collect();
            self.chain.entry(tail).or_default().push(END);
        }
    }

    /// Forget all training data
    pub fn clear(&mut self) {
        self.chain.clear();
    }

    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn successors(&self, prefix: &str) -> &[char] {
        self.chain.get(prefix).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Generate a name, stopping at a word end or at `max_length` characters
    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        let mut prefix: Vec<char> = vec![' '; self.chain_len];
        let mut name = String::new();
        let mut length = 0;
        while length < self.max_length {
            let key: String = prefix.iter().collect();
            let options = self.successors(&key);
            if options.is_empty() {
                break;
            }
            let next = options[rng.gen_range(0..options.len())];
            if next == END {
                break;
            }
            name.push(next);
            length += 1;
            prefix.remove(0);
            prefix.push(next);
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_single_word_reproduces_itself() {
        let chain = MarkovChain::new(["orc"], 2, 10).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(chain.generate(&mut rng), "orc");
    }

    #[test]
    fn test_max_length_caps_output() {
        let chain = MarkovChain::new(["aaaaaaaaaaaaaaaa"], 1, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..10 {
            assert!(chain.generate(&mut rng).chars().count() <= 5);
        }
    }

    #[test]
    fn test_generated_names_use_training_alphabet() {
        let words = ["gandalf", "galadriel", "gimli", "legolas"];
        let chain = MarkovChain::new(words, 2, 12).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let alphabet: String = words.concat();
        for _ in 0..20 {
            let name = chain.generate(&mut rng);
            assert!(name.chars().all(|c| alphabet.contains(c)));
        }
    }

    #[test]
    fn test_chain_length_bounds() {
        assert!(MarkovChain::new(["x"], 0, 5).is_err());
        assert!(MarkovChain::new(["x"], 11, 5).is_err());
        assert!(MarkovChain::new(["x"], 10, 5).is_ok());
    }
}
