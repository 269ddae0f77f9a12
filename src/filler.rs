//! Lorem ipsum titles and bodies. No network, no external service.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::models::ContentBlock;

pub const LOREM_WORDS: [&str; 62] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do", "eiusmod",
    "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim", "ad", "minim", "veniam",
    "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip", "ex", "ea", "commodo",
    "consequat", "duis", "aute", "irure", "in", "reprehenderit", "voluptate", "velit", "esse", "cillum",
    "fugiat", "nulla", "pariatur", "excepteur", "sint", "occaecat", "cupidatat", "non", "proident", "sunt",
    "culpa", "qui", "officia", "deserunt", "mollit", "anim", "id", "est", "laborum",
];

pub const LOREM_PARAGRAPHS: [&str; 12] = [
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.",
    "Duis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum.",
    "Sed ut perspiciatis unde omnis iste natus error sit voluptatem accusantium doloremque laudantium, totam rem aperiam, eaque ipsa quae ab illo inventore veritatis et quasi architecto beatae vitae dicta sunt explicabo.",
    "Nemo enim ipsam voluptatem quia voluptas sit aspernatur aut odit aut fugit, sed quia consequuntur magni dolores eos qui ratione voluptatem sequi nesciunt.",
    "Neque porro quisquam est, qui dolorem ipsum quia dolor sit amet, consectetur, adipisci velit, sed quia non numquam eius modi tempora incidunt ut labore et dolore magnam aliquam quaerat voluptatem.",
    "At vero eos et accusamus et iusto odio dignissimos ducimus qui blanditiis praesentium voluptatum deleniti atque corrupti quos dolores et quas molestias excepturi sint occaecati cupiditate non provident.",
    "Ut enim ad minima veniam, quis nostrum exercitationem ullam corporis suscipit laboriosam, nisi ut aliquid ex ea commodi consequatur?",
    "Quis autem vel eum iure reprehenderit qui in ea voluptate velit esse quam nihil molestiae consequatur, vel illum qui dolorem eum fugiat quo voluptas nulla pariatur?",
    "But I must explain to you how all this mistaken idea of denouncing pleasure and praising pain was born and I will give you a complete account of the system.",
    "On the other hand, we denounce with righteous indignation and dislike men who are so beguiled and demoralized by the charms of pleasure of the moment, so blinded by desire, that they cannot foresee the pain and trouble that are bound to ensue.",
    "These cases are perfectly simple and easy to distinguish. In a free hour, when our power of choice is untrammelled and when nothing prevents our being able to do what we like best, every pleasure is to be welcomed and every pain avoided.",
    "But in certain circumstances and owing to the claims of duty or the obligations of business it will frequently occur that pleasures have to be repudiated and annoyances accepted.",
];

/// CSS class carried by the attribution block.
pub const CREDIT_CLASS: &str = "fakepost-credit";

/// Target paragraph length in word-budget mode.
const WORDS_PER_PARAGRAPH: u32 = 30;
const MIN_WORDS_PER_PARAGRAPH: u32 = 20;

/// Title of `word_count` capitalised corpus words.
///
/// Without `allow_repeats` the words are distinct and a request larger than the
/// corpus is silently truncated to the corpus size. With `allow_repeats` a
/// request larger than the corpus samples with replacement instead.
pub fn generate_title<R: Rng + ?Sized>(word_count: usize, allow_repeats: bool, rng: &mut R) -> String {
    let words: Vec<&str> = if allow_repeats && word_count > LOREM_WORDS.len() {
        (0..word_count)
            .filter_map(|_| LOREM_WORDS.choose(rng).copied())
            .collect()
    } else {
        let mut shuffled = LOREM_WORDS.to_vec();
        shuffled.shuffle(rng);
        shuffled.truncate(word_count);
        shuffled
    };

    words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join(" ")
}

/// `paragraph_count` corpus paragraphs as blocks, plus an optional credit block.
///
/// Up to the corpus size the paragraphs are distinct; beyond it they repeat.
pub fn generate_content<R: Rng + ?Sized>(
    paragraph_count: usize,
    credit_url: Option<&str>,
    rng: &mut R,
) -> Vec<ContentBlock> {
    let paragraphs: Vec<&str> = if paragraph_count <= LOREM_PARAGRAPHS.len() {
        let mut shuffled = LOREM_PARAGRAPHS.to_vec();
        shuffled.shuffle(rng);
        shuffled.truncate(paragraph_count);
        shuffled
    } else {
        (0..paragraph_count)
            .filter_map(|_| LOREM_PARAGRAPHS.choose(rng).copied())
            .collect()
    };

    let mut blocks: Vec<ContentBlock> = paragraphs.into_iter().map(ContentBlock::paragraph).collect();
    if let Some(url) = credit_url {
        blocks.push(filler_credit_block(url));
    }
    blocks
}

/// Paragraphs totalling exactly `total_words` words sampled with replacement.
/// No coherence guarantee, only the word count and sentence-like segmentation.
pub fn generate_word_budget<R: Rng + ?Sized>(total_words: u32, rng: &mut R) -> Vec<String> {
    let per_paragraph = words_per_paragraph(total_words);
    let mut remaining = total_words;
    let mut paragraphs = Vec::new();

    while remaining > 0 {
        let take = remaining.min(per_paragraph);
        let words: Vec<&str> = (0..take).filter_map(|_| LOREM_WORDS.choose(rng).copied()).collect();
        let mut sentence = capitalize(&words.join(" "));
        sentence.push('.');
        paragraphs.push(sentence);
        remaining -= take;
    }

    paragraphs
}

/// Word-budget paragraphs as blocks, plus an optional credit block.
pub fn generate_word_budget_content<R: Rng + ?Sized>(
    total_words: u32,
    credit_url: Option<&str>,
    rng: &mut R,
) -> Vec<ContentBlock> {
    let mut blocks: Vec<ContentBlock> = generate_word_budget(total_words, rng)
        .into_iter()
        .map(ContentBlock::paragraph)
        .collect();
    if let Some(url) = credit_url {
        blocks.push(filler_credit_block(url));
    }
    blocks
}

fn words_per_paragraph(total_words: u32) -> u32 {
    let paragraphs = (total_words / WORDS_PER_PARAGRAPH).max(1);
    (total_words / paragraphs).max(MIN_WORDS_PER_PARAGRAPH)
}

fn filler_credit_block(url: &str) -> ContentBlock {
    ContentBlock::with_class(
        CREDIT_CLASS,
        format!(
            "<small><em>Generated by <a href=\"{url}\" target=\"_blank\" rel=\"noopener\">Fake Post AI</a></em></small>"
        ),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
