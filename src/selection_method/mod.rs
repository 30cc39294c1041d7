use crate::common::types::Endpoint;

pub mod random;

/// Decides the order in which one connection cycle walks the candidates.
pub trait SelectionAlgorithm {
    fn order(&self, candidates: &mut [Endpoint]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    InOrder,
    Random,
}

impl SelectionMethod {
    pub fn from_randomize(randomize: bool) -> Self {
        if randomize {
            SelectionMethod::Random
        } else {
            SelectionMethod::InOrder
        }
    }
}

impl SelectionAlgorithm for SelectionMethod {
    fn order(&self, candidates: &mut [Endpoint]) {
        match self {
            SelectionMethod::InOrder => {}
            SelectionMethod::Random => random::Random.order(candidates),
        }
    }
}
