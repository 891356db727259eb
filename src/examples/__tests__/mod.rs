mod lexical_test;
mod semantic_test;
mod syntactic_test;
