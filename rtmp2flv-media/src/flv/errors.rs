#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct FlvMuxerError {
    pub value: MuxerErrorValue,
}

#[derive(Debug, thiserror::Error)]
pub enum MuxerErrorValue {
    #[error("tag data too large: {0} bytes (max 16777215)")]
    TagTooLarge(usize),
    #[error("flv file header already written")]
    HeaderAlreadyWritten,
}

impl From<MuxerErrorValue> for FlvMuxerError {
    fn from(value: MuxerErrorValue) -> Self {
        Self { value }
    }
}
