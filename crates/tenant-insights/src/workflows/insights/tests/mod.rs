mod assembler;
mod common;
