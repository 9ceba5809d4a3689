//! Content models over child sequences
//!
//! A [`Particle`] is a regular expression over terms (element declarations,
//! wildcards, DTD element names). Matching tracks the set of input positions
//! reachable after each particle, so ambiguous or nested repetitions never
//! backtrack exponentially. On failure the matcher reports the furthest
//! position any path reached and the terms that could have continued there.

use std::collections::BTreeSet;

/// A leaf of a content model that accepts single items
pub trait Term<S> {
    fn accepts(&self, item: &S) -> bool;

    /// Name used in "Expected is ( ... )" messages
    fn describe(&self) -> String;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Particle<T> {
    /// Matches the empty sequence only
    Empty,
    Term(T),
    Sequence(Vec<Particle<T>>),
    Choice(Vec<Particle<T>>),
    /// Every member at most once, in any order; members wrapped in a
    /// `Repeat` with `min == 0` are optional
    All(Vec<Particle<T>>),
    Repeat {
        inner: Box<Particle<T>>,
        min: usize,
        max: Option<usize>,
    },
}

/// Why a child sequence does not match
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// The item at `index` cannot appear there
    Unexpected { index: usize, expected: Vec<String> },
    /// Input ended before the model was satisfied
    Incomplete { expected: Vec<String> },
}

impl Mismatch {
    /// libxml-style "Expected is ( a )" / "Expected is one of ( a, b )"
    pub fn expected_clause(&self) -> String {
        let expected = match self {
            Self::Unexpected { expected, .. } | Self::Incomplete { expected } => expected,
        };
        match expected.as_slice() {
            [] => String::new(),
            [only] => format!(" Expected is ( {only} )."),
            many => format!(" Expected is one of ( {} ).", many.join(", ")),
        }
    }
}

type Positions = BTreeSet<usize>;

impl<T> Particle<T> {
    /// Wrap with occurrence bounds, leaving `1..=1` unwrapped
    pub fn occurs(self, min: usize, max: Option<usize>) -> Self {
        if min == 1 && max == Some(1) {
            return self;
        }
        Self::Repeat {
            inner: Box::new(self),
            min,
            max,
        }
    }

    /// All terms in model order
    pub fn terms(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Self::Empty => {}
            Self::Term(term) => out.push(term),
            Self::Sequence(items) | Self::Choice(items) | Self::All(items) => {
                for item in items {
                    item.collect_terms(out);
                }
            }
            Self::Repeat { inner, .. } => inner.collect_terms(out),
        }
    }

    /// Whether the model accepts the empty sequence
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Term(_) => false,
            Self::Sequence(items) => items.iter().all(Self::is_nullable),
            Self::Choice(items) => items.iter().any(Self::is_nullable),
            Self::All(items) => items.iter().all(|item| !all_member(item).1),
            Self::Repeat { inner, min, .. } => *min == 0 || inner.is_nullable(),
        }
    }

    /// Match `items` completely
    pub fn check<S>(&self, items: &[S]) -> Result<(), Mismatch>
    where
        T: Term<S>,
    {
        let mut matcher = Matcher {
            items,
            target: None,
            expected: Vec::new(),
        };
        if matcher.ends(self, 0).contains(&items.len()) {
            return Ok(());
        }

        let furthest = matcher.partial(self, 0).last().copied().unwrap_or(0);
        matcher.target = Some(furthest);
        matcher.partial(self, 0);
        let mut expected = matcher.expected;
        let mut seen = BTreeSet::new();
        expected.retain(|name| seen.insert(name.clone()));

        if furthest < items.len() {
            Err(Mismatch::Unexpected {
                index: furthest,
                expected,
            })
        } else {
            Err(Mismatch::Incomplete { expected })
        }
    }
}

/// Inner particle of an `all` member and whether it is required
fn all_member<T>(particle: &Particle<T>) -> (&Particle<T>, bool) {
    match particle {
        Particle::Repeat { inner, min, .. } => (inner, *min > 0),
        other => (other, true),
    }
}

struct Matcher<'i, S> {
    items: &'i [S],
    /// Position whose continuations are being collected
    target: Option<usize>,
    expected: Vec<String>,
}

impl<S> Matcher<'_, S> {
    /// Positions reachable after matching `particle` completely from `start`
    fn ends<T: Term<S>>(&mut self, particle: &Particle<T>, start: usize) -> Positions {
        match particle {
            Particle::Empty => Positions::from([start]),
            Particle::Term(term) => match self.items.get(start) {
                Some(item) if term.accepts(item) => Positions::from([start + 1]),
                _ => Positions::new(),
            },
            Particle::Sequence(parts) => {
                let mut current = Positions::from([start]);
                for part in parts {
                    let mut next = Positions::new();
                    for pos in current {
                        next.extend(self.ends(part, pos));
                    }
                    current = next;
                    if current.is_empty() {
                        break;
                    }
                }
                current
            }
            Particle::Choice(options) => {
                let mut out = Positions::new();
                for option in options {
                    out.extend(self.ends(option, start));
                }
                out
            }
            Particle::All(members) => self.all_states(members, start, false),
            Particle::Repeat { inner, min, max } => {
                let mut out = Positions::new();
                let mut current = Positions::from([start]);
                let mut seen = Positions::new();
                let mut count = 0;
                loop {
                    if count >= *min {
                        out.extend(current.iter().copied());
                    }
                    if max.is_some_and(|max| count >= max) || current.is_empty() {
                        break;
                    }
                    let mut next = Positions::new();
                    for pos in &current {
                        next.extend(self.ends(inner, *pos));
                    }
                    count += 1;
                    // past `min`, only new positions can change the result
                    if count > *min {
                        next.retain(|pos| !seen.contains(pos));
                    }
                    seen.extend(next.iter().copied());
                    if count > self.items.len() + *min {
                        break;
                    }
                    current = next;
                }
                out
            }
        }
    }

    /// Positions reachable by matching any prefix of `particle`, recording
    /// the terms tried at the target position
    fn partial<T: Term<S>>(&mut self, particle: &Particle<T>, start: usize) -> Positions {
        match particle {
            Particle::Empty => Positions::from([start]),
            Particle::Term(term) => {
                if self.target == Some(start) {
                    self.expected.push(term.describe());
                }
                match self.items.get(start) {
                    Some(item) if term.accepts(item) => Positions::from([start, start + 1]),
                    _ => Positions::from([start]),
                }
            }
            Particle::Sequence(parts) => {
                let mut out = Positions::from([start]);
                let mut current = Positions::from([start]);
                for part in parts {
                    let mut next = Positions::new();
                    for pos in &current {
                        out.extend(self.partial(part, *pos));
                        next.extend(self.ends(part, *pos));
                    }
                    current = next;
                    if current.is_empty() {
                        break;
                    }
                }
                out.extend(current);
                out
            }
            Particle::Choice(options) => {
                let mut out = Positions::from([start]);
                for option in options {
                    out.extend(self.partial(option, start));
                }
                out
            }
            Particle::All(members) => self.all_states(members, start, true),
            Particle::Repeat { inner, max, .. } => {
                let mut out = Positions::from([start]);
                let mut current = Positions::from([start]);
                let mut seen = Positions::from([start]);
                let mut count = 0;
                while !current.is_empty() && max.is_none_or(|max| count < max) {
                    let mut next = Positions::new();
                    for pos in &current {
                        out.extend(self.partial(inner, *pos));
                        next.extend(self.ends(inner, *pos));
                    }
                    next.retain(|pos| !seen.contains(pos));
                    seen.extend(next.iter().copied());
                    current = next;
                    count += 1;
                }
                out
            }
        }
    }

    /// Breadth-first walk over (position, used members) states of an `all`
    /// group. With `partial` every visited position is returned, otherwise
    /// only positions where all required members were used.
    fn all_states<T: Term<S>>(
        &mut self,
        members: &[Particle<T>],
        start: usize,
        partial: bool,
    ) -> Positions {
        let required: Vec<bool> = members.iter().map(|m| all_member(m).1).collect();
        let mut out = Positions::new();
        let mut visited: BTreeSet<(usize, Vec<bool>)> = BTreeSet::new();
        let mut queue = vec![(start, vec![false; members.len()])];
        while let Some((pos, used)) = queue.pop() {
            if !visited.insert((pos, used.clone())) {
                continue;
            }
            let complete = used.iter().zip(&required).all(|(u, r)| *u || !*r);
            if partial || complete {
                out.insert(pos);
            }
            for (index, member) in members.iter().enumerate() {
                if used.get(index).copied().unwrap_or(true) {
                    continue;
                }
                let (inner, _) = all_member(member);
                if partial {
                    out.extend(self.partial(inner, pos));
                }
                for end in self.ends(inner, pos) {
                    if end == pos {
                        continue;
                    }
                    let mut next = used.clone();
                    if let Some(slot) = next.get_mut(index) {
                        *slot = true;
                    }
                    queue.push((end, next));
                }
            }
        }
        out
    }
}
