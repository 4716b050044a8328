//! Free-text, category and payment-status filters over donor aggregates.
//!
//! The free-text match falls back to a romanized form of the donor name so
//! a search for "shri" finds "श्री राम". Transliteration is a literal
//! substitution table applied in order, longest entries first — a lookup
//! aid, not a phonetic algorithm.

use crate::core::aggregate::DonorAggregate;

/// Ordered find/replace table. Proper nouns and conjuncts come before
/// single glyphs so "श्री" wins over "श" + matras.
const TRANSLIT_TABLE: &[(&str, &str)] = &[
    // Proper nouns common in donor names
    ("श्रीमती", "shrimati"),
    ("श्री", "shri"),
    ("राम", "ram"),
    ("कृष्ण", "krishna"),
    ("गणेश", "ganesh"),
    ("लक्ष्मी", "lakshmi"),
    ("हनुमान", "hanuman"),
    ("दुर्गा", "durga"),
    ("सीता", "sita"),
    ("शिव", "shiv"),
    ("देवी", "devi"),
    ("मंदिर", "mandir"),
    ("शर्मा", "sharma"),
    ("वर्मा", "verma"),
    ("गुप्ता", "gupta"),
    ("सिंह", "singh"),
    ("कुमार", "kumar"),
    ("पटेल", "patel"),
    ("प्रसाद", "prasad"),
    // Conjuncts
    ("क्ष", "ksh"),
    ("त्र", "tra"),
    ("ज्ञ", "gya"),
    ("श्र", "shr"),
    // Aspirated consonants
    ("ख", "kh"),
    ("घ", "gh"),
    ("छ", "chh"),
    ("झ", "jh"),
    ("ठ", "th"),
    ("ढ", "dh"),
    ("थ", "th"),
    ("ध", "dh"),
    ("फ", "ph"),
    ("भ", "bh"),
    ("श", "sh"),
    ("ष", "sh"),
    // Plain consonants
    ("क", "k"),
    ("ग", "g"),
    ("च", "ch"),
    ("ज", "j"),
    ("ट", "t"),
    ("ड", "d"),
    ("ण", "n"),
    ("त", "t"),
    ("द", "d"),
    ("न", "n"),
    ("प", "p"),
    ("ब", "b"),
    ("म", "m"),
    ("य", "y"),
    ("र", "r"),
    ("ल", "l"),
    ("व", "v"),
    ("स", "s"),
    ("ह", "h"),
    // Independent vowels
    ("आ", "aa"),
    ("अ", "a"),
    ("इ", "i"),
    ("ई", "ee"),
    ("उ", "u"),
    ("ऊ", "oo"),
    ("ए", "e"),
    ("ऐ", "ai"),
    ("ओ", "o"),
    ("औ", "au"),
    // Matras and signs
    ("ा", "a"),
    ("ि", "i"),
    ("ी", "i"),
    ("ु", "u"),
    ("ू", "u"),
    ("े", "e"),
    ("ै", "ai"),
    ("ो", "o"),
    ("ौ", "au"),
    ("ं", "n"),
    ("ः", "h"),
    ("़", ""),
    ("्", ""),
];

/// Lowercases the input and applies the substitution table in order.
pub fn transliterate(input: &str) -> String {
    let mut out = input.to_lowercase();
    for (from, to) in TRANSLIT_TABLE {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentFilter {
    #[default]
    Any,
    /// Total strictly greater than zero.
    Paid,
    /// Total exactly zero — a commitment without a completed payment.
    Pledged,
}

impl PaymentFilter {
    /// Parses the query-string form. Empty selects everything; anything
    /// other than "paid"/"pledged" is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" => Some(PaymentFilter::Any),
            "paid" => Some(PaymentFilter::Paid),
            "pledged" => Some(PaymentFilter::Pledged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DonorFilter {
    pub term: Option<String>,
    pub category_id: Option<String>,
    pub payment: PaymentFilter,
}

fn matches(aggregate: &DonorAggregate, filter: &DonorFilter) -> bool {
    if let Some(term) = &filter.term {
        let term = term.trim().to_lowercase();
        if !term.is_empty() {
            let name = aggregate.donor_name.to_lowercase();
            if !name.contains(&term) && !transliterate(&aggregate.donor_name).contains(&term) {
                return false;
            }
        }
    }

    if let Some(category_id) = &filter.category_id {
        if !category_id.is_empty() && &aggregate.category_id != category_id {
            return false;
        }
    }

    match filter.payment {
        PaymentFilter::Any => true,
        PaymentFilter::Paid => aggregate.total > 0,
        PaymentFilter::Pledged => aggregate.total == 0,
    }
}

/// Applies all three filters, ANDed. Ordering of the survivors is left to
/// the caller.
pub fn filter_donors(
    aggregates: Vec<DonorAggregate>,
    filter: &DonorFilter,
) -> Vec<DonorAggregate> {
    aggregates
        .into_iter()
        .filter(|a| matches(a, filter))
        .collect()
}
