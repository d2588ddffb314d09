// Search surface (spec 4.6): the filter/pagination chain shared by every
// query type, and the hybrid search manager that fuses semantic, lexical,
// and symbolic layers.

pub mod filter;
pub mod hybrid;
