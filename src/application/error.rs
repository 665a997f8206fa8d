#[derive(Debug)]
pub enum ApplicationError {
    NotFound(String),
    InvalidInput(String),
    BadRequest(String),
    PayloadTooLarge { max: u64 },
    ReadFailure(String),
    WriteFailure(String),
    Cancelled,
    DeadlineExceeded,
    Unavailable(String),
    InternalError(String),
}
