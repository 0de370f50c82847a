//! Built-in content: the modules every install ships with, so the app is
//! usable without a catalog file.

use std::collections::BTreeSet;

use crate::domain::{Difficulty, Exercise, Grading, Level, MatchRule, Module};

fn choice(id: &str, prompt: &str, options: &[&str], correct: usize, points: u32, explanation: &str) -> Exercise {
  Exercise {
    id: id.into(),
    prompt: prompt.into(),
    options: options.iter().map(|s| s.to_string()).collect(),
    grading: Grading::SingleChoice { correct },
    points,
    explanation: explanation.into(),
    difficulty: Difficulty::Easy,
  }
}

fn multi(id: &str, prompt: &str, options: &[&str], accepted: &[usize], rule: MatchRule, points: u32, explanation: &str) -> Exercise {
  Exercise {
    id: id.into(),
    prompt: prompt.into(),
    options: options.iter().map(|s| s.to_string()).collect(),
    grading: Grading::MultiSelect { accepted: accepted.iter().copied().collect::<BTreeSet<_>>(), rule },
    points,
    explanation: explanation.into(),
    difficulty: Difficulty::Medium,
  }
}

fn exact(id: &str, prompt: &str, answer: &str, points: u32, explanation: &str) -> Exercise {
  Exercise {
    id: id.into(),
    prompt: prompt.into(),
    options: Vec::new(),
    grading: Grading::FreeTextExact { answer: answer.into() },
    points,
    explanation: explanation.into(),
    difficulty: Difficulty::Easy,
  }
}

fn lenient(id: &str, prompt: &str, accepted: &[&str], points: u32, explanation: &str) -> Exercise {
  Exercise {
    id: id.into(),
    prompt: prompt.into(),
    options: Vec::new(),
    grading: Grading::FreeTextLenient { accepted: accepted.iter().map(|s| s.to_string()).collect() },
    points,
    explanation: explanation.into(),
    difficulty: Difficulty::Medium,
  }
}

fn creative(id: &str, prompt: &str, min_words: usize, points: u32, explanation: &str) -> Exercise {
  Exercise {
    id: id.into(),
    prompt: prompt.into(),
    options: Vec::new(),
    grading: Grading::MinLengthCreative { min_words },
    points,
    explanation: explanation.into(),
    difficulty: Difficulty::Hard,
  }
}

fn level(id: &str, name: &str, exercises: Vec<Exercise>) -> Level {
  Level { id: id.into(), name: name.into(), exercises }
}

fn module(id: &str, name: &str, description: &str, levels: Vec<Level>) -> Module {
  Module { id: id.into(), name: name.into(), description: description.into(), levels }
}

pub fn builtin_modules() -> Vec<Module> {
  vec![arithmetic(), fractions(), geometry(), algebra(), phonics(), reading()]
}

fn arithmetic() -> Module {
  module("arithmetic", "Number Land", "Adding, subtracting and multiplying.", vec![
    level("addition", "Adding up", vec![
      choice("add-1", "What is 3 + 4?", &["6", "7", "8", "9"], 1, 10, "Count on from 3: 4, 5, 6, 7."),
      choice("add-2", "What is 8 + 5?", &["12", "13", "14", "15"], 1, 10, "8 + 2 makes 10, then 3 more is 13."),
      exact("add-3", "Type the answer: 9 + 9 = ?", "18", 10, "Double 9 is 18."),
    ]),
    level("subtraction", "Taking away", vec![
      choice("sub-1", "What is 10 - 3?", &["6", "7", "8"], 1, 10, "Count back 3 from 10: 9, 8, 7."),
      exact("sub-2", "Type the answer: 15 - 6 = ?", "9", 10, "15 - 5 is 10, and one more away is 9."),
      choice("sub-3", "What is 20 - 12?", &["8", "12", "18", "32"], 0, 10, "20 - 10 is 10, minus 2 more is 8."),
    ]),
    level("multiplication", "Times tables", vec![
      choice("mul-1", "What is 3 × 4?", &["7", "12", "14", "16"], 1, 15, "3 groups of 4 make 12."),
      exact("mul-2", "Type the answer: 6 × 7 = ?", "42", 15, "6 × 7 = 42."),
      multi("mul-3", "Pick every multiple of 5.", &["10", "12", "25", "33"], &[0, 2], MatchRule::Exact, 15, "Multiples of 5 end in 0 or 5."),
    ]),
  ])
}

fn fractions() -> Module {
  module("fractions", "Pizza Fractions", "Halves, quarters and comparing parts.", vec![
    level("halves", "Halves and quarters", vec![
      choice("half-1", "A pizza is cut into 2 equal slices. One slice is…", &["1/4", "1/2", "1/3"], 1, 10, "One of two equal parts is one half."),
      choice("half-2", "Which fraction is the same as 2/4?", &["1/2", "1/4", "3/4"], 0, 10, "Two quarters make one half."),
      exact("half-3", "How many quarters make a whole?", "4", 10, "A whole is 4/4."),
    ]),
    level("compare", "Bigger or smaller", vec![
      choice("cmp-1", "Which is bigger?", &["1/3", "1/2", "1/8"], 1, 15, "Fewer slices means bigger slices."),
      multi("cmp-2", "Pick the fractions bigger than 1/2.", &["3/4", "1/4", "2/3", "1/5"], &[0, 2], MatchRule::Exact, 15, "3/4 and 2/3 are both more than half."),
      lenient("cmp-3", "What do we call the bottom number of a fraction?", &["denominator", "the denominator"], 15, "The denominator tells how many equal parts."),
    ]),
  ])
}

fn geometry() -> Module {
  module("geometry", "Shape Safari", "Naming shapes and counting sides.", vec![
    level("shapes", "Name that shape", vec![
      choice("shp-1", "How many sides does a triangle have?", &["2", "3", "4", "5"], 1, 10, "Tri means three."),
      lenient("shp-2", "A shape with 4 equal sides and 4 right angles is a…", &["square", "a square"], 10, "All sides equal and all corners square: a square."),
      multi("shp-3", "Which shapes have curved edges?", &["circle", "square", "oval", "triangle"], &[0, 2], MatchRule::AnyOverlap, 10, "Circles and ovals are round."),
    ]),
    level("solids", "3D shapes", vec![
      choice("sol-1", "Which shape is a ball?", &["cube", "sphere", "cone"], 1, 15, "A sphere is round in every direction."),
      exact("sol-2", "How many faces does a cube have?", "6", 15, "Top, bottom and four sides: 6 faces."),
    ]),
  ])
}

fn algebra() -> Module {
  module("algebra", "Mystery Numbers", "Finding the missing number.", vec![
    level("missing", "Missing numbers", vec![
      exact("mis-1", "x + 3 = 7. What is x?", "4", 10, "Take 3 away from both sides: x = 4."),
      exact("mis-2", "2 × y = 10. What is y?", "5", 10, "Split 10 into 2 equal groups: 5."),
      choice("mis-3", "Which number makes □ - 4 = 6 true?", &["2", "10", "24"], 1, 10, "Add 4 back: 6 + 4 = 10."),
    ]),
    level("patterns", "Number patterns", vec![
      exact("pat-1", "What comes next: 2, 4, 6, 8, …?", "10", 15, "The pattern adds 2 each time."),
      choice("pat-2", "What comes next: 1, 3, 9, 27, …?", &["36", "54", "81"], 2, 15, "Each number is 3 times the one before."),
    ]),
  ])
}

fn phonics() -> Module {
  module("phonics", "Sound Garden", "Letter sounds and rhymes.", vec![
    level("sounds", "Starting sounds", vec![
      choice("snd-1", "Which word starts with the 'b' sound?", &["cat", "ball", "dog"], 1, 10, "Ball begins with b."),
      lenient("snd-2", "Say a word that rhymes with 'cat'.", &["hat", "bat", "mat", "rat", "sat", "pat", "fat"], 10, "Rhyming words share the ending sound: -at."),
      multi("snd-3", "Pick the words with a short 'a' sound.", &["apple", "cake", "hat", "rain"], &[0, 2], MatchRule::Exact, 10, "Apple and hat have a short a; cake and rain have a long a."),
    ]),
    level("blends", "Letter blends", vec![
      choice("bln-1", "Which blend starts the word 'frog'?", &["fl", "fr", "gr"], 1, 15, "F and r blend together: fr-og."),
      exact("bln-2", "Spell the word for a young cat.", "kitten", 15, "K-i-t-t-e-n."),
    ]),
  ])
}

fn reading() -> Module {
  module("reading", "Story Lake", "Reading short stories and writing your own.", vec![
    level("understand", "Understanding stories", vec![
      choice(
        "rd-1",
        "Sam took his umbrella because the sky was dark and grey. What was the weather probably going to be?",
        &["sunny", "rainy", "snowy"],
        1,
        10,
        "Dark grey clouds usually mean rain.",
      ),
      lenient("rd-2", "What is the opposite of 'happy'?", &["sad", "unhappy"], 10, "Happy and sad are opposites."),
    ]),
    level("write", "Write a story", vec![
      creative("wr-1", "Write a few sentences about your favourite animal. Use at least 10 words.", 10, 20, "Tell us what it looks like, where it lives and why you like it."),
      creative("wr-2", "Describe your perfect day. Use at least 15 words.", 15, 25, "Think about where you would go, who you would see and what you would eat."),
    ]),
  ])
}
