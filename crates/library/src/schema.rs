use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, TextFieldIndexing, TextOptions, STORED,
    STRING,
};

pub const TYPE_TRACK: &str = "track";
pub const TYPE_DIRECTORY: &str = "directory";

/// Field handles for the two document kinds.
///
/// Key fields (`uri`, `parent`, `type`) are raw strings so term queries match
/// whole values. The searchable text fields record positions so phrase
/// queries can run against them; their content is reconstructible from the
/// stored payload, so they are not stored themselves.
#[derive(Clone, Copy, Debug)]
pub struct IndexSchema {
    pub uri: Field,
    pub parent: Field,
    pub pathname: Field,
    pub doc_type: Field,
    pub name: Field,
    pub artists: Field,
    pub album: Field,
    pub content: Field,
    pub payload: Field,
}

impl IndexSchema {
    pub fn build() -> (Schema, IndexSchema) {
        let mut builder = SchemaBuilder::default();

        let uri = builder.add_text_field("uri", STRING | STORED);
        let parent = builder.add_text_field("parent", STRING | STORED);
        let pathname = builder.add_text_field("pathname", STRING | STORED);
        let doc_type = builder.add_text_field("type", STRING | STORED);

        let text = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        let name = builder.add_text_field("name", text.clone());
        let artists = builder.add_text_field("artists", text.clone());
        let album = builder.add_text_field("album", text.clone());
        let content = builder.add_text_field("content", text);

        let payload = builder.add_bytes_field("track", STORED);

        let schema = builder.build();
        let fields = IndexSchema {
            uri,
            parent,
            pathname,
            doc_type,
            name,
            artists,
            album,
            content,
            payload,
        };
        (schema, fields)
    }
}
