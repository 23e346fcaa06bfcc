//! Account state port trait.

pub trait AccountInfo {
    fn current_equity(&self) -> f64;
    fn current_balance(&self) -> f64;
}
