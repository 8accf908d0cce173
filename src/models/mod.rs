pub mod sabr;
