pub mod word_index;
