pub mod conversation_turn;
pub mod corpus_record;
pub mod corpus_table;
