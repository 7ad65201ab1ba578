pub(crate) const MAX_PARAMS: usize = 255;
pub(crate) const MAX_ARGS: usize = 255;

// How deep statements and parenthesised, unary or assignment expressions may nest in the source
pub(crate) const MAX_NESTING: usize = 1024;

// The stack grows on demand, so this only has to catch runaway recursion
pub(crate) const MAX_CALL_DEPTH: usize = 10_000;
