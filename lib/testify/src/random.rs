use rand::distr::{Alphanumeric, SampleString};

pub fn random_string(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}
