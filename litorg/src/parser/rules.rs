//! Line-taking combinators from which a language's rule table is assembled.
//!
//! A [`Rule`] answers two questions about the lines at the current position:
//! how many of them it takes (zero meaning "not mine") and which [`Element`]
//! those lines make.

use crate::element::Element;
use crate::parameters::ParameterError;

/// How many lines to take from the front of the slice. Zero means no match.
pub type Taker = Box<dyn Fn(&[String]) -> usize + Send + Sync>;

/// Turn the taken lines into an element.
pub type Maker = fn(&[String]) -> Result<Element, ParameterError>;

pub struct Rule {
    pub name: &'static str,
    take: Taker,
    make: Maker,
}

impl Rule {
    pub fn new(name: &'static str, take: Taker, make: Maker) -> Self {
        Rule { name, take, make }
    }

    pub fn take(&self, lines: &[String]) -> usize {
        if lines.is_empty() {
            return 0;
        }
        (self.take)(lines)
    }

    pub fn make(&self, lines: &[String]) -> Result<Element, ParameterError> {
        (self.make)(lines)
    }
}

/// Take every consecutive line satisfying `pred`.
pub fn greedy(pred: impl Fn(&str) -> bool + Send + Sync + 'static) -> Taker {
    Box::new(move |lines: &[String]| lines.iter().take_while(|l| pred(l.as_str())).count())
}

/// Take the first line when it satisfies `pred`.
pub fn first(pred: impl Fn(&str) -> bool + Send + Sync + 'static) -> Taker {
    Box::new(move |lines: &[String]| usize::from(pred(&lines[0])))
}

/// Take everything from a line satisfying `open` up to and including the next
/// line satisfying `close`. Takes nothing when `close` never matches.
pub fn between(
    open: impl Fn(&str) -> bool + Send + Sync + 'static,
    close: impl Fn(&str) -> bool + Send + Sync + 'static,
) -> Taker {
    Box::new(move |lines: &[String]| {
        if !open(&lines[0]) {
            return 0;
        }
        lines[1..]
            .iter()
            .position(|l| close(l))
            .map_or(0, |i| i + 2)
    })
}

/// Take lines satisfying `core`, along with interior lines satisfying `filler`,
/// stopping at the first line matching neither. Never ends on a filler line.
/// A line matching both is treated as filler.
pub fn trailing(
    filler: impl Fn(&str) -> bool + Send + Sync + 'static,
    core: impl Fn(&str) -> bool + Send + Sync + 'static,
) -> Taker {
    Box::new(move |lines: &[String]| {
        let mut taken = 0;
        for (i, line) in lines.iter().enumerate() {
            if filler(line) {
                continue;
            }
            if !core(line) {
                break;
            }
            taken = i + 1;
        }
        taken
    })
}
