mod waitable;

pub(crate) use waitable::Waitable;
