use crate::error::ApiError;
use crate::users::{dto::ListQuery, MOUNT};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Coerces raw query values. A missing, unparsable or zero value falls
    /// back to the default; a negative one is rejected.
    pub fn from_query(q: &ListQuery) -> Result<Self, ApiError> {
        Ok(Self {
            page: coerce("page", q.page.as_deref(), DEFAULT_PAGE)?,
            page_size: coerce("pageSize", q.page_size.as_deref(), DEFAULT_PAGE_SIZE)?,
        })
    }

    pub fn skip(&self) -> Result<i64, ApiError> {
        (self.page - 1)
            .checked_mul(self.page_size)
            .ok_or_else(|| ApiError::BadRequest("page is out of range".into()))
    }

    pub fn total_pages(&self, count: i64) -> i64 {
        count / self.page_size + i64::from(count % self.page_size != 0)
    }

    pub fn next_link(&self, total_pages: i64) -> Option<String> {
        (self.page < total_pages).then(|| self.link(self.page + 1))
    }

    pub fn prev_link(&self) -> Option<String> {
        (self.page > 1).then(|| self.link(self.page - 1))
    }

    fn link(&self, page: i64) -> String {
        format!("{MOUNT}?page={page}&pageSize={}", self.page_size)
    }
}

fn coerce(name: &str, raw: Option<&str>, default: i64) -> Result<i64, ApiError> {
    match raw.map(leading_int) {
        None | Some(Ok(None)) | Some(Ok(Some(0))) => Ok(default),
        Some(Ok(Some(v))) if v < 0 => Err(ApiError::BadRequest(format!(
            "{name} must be a positive integer"
        ))),
        Some(Ok(Some(v))) => Ok(v),
        Some(Err(())) => Err(ApiError::BadRequest(format!("{name} is out of range"))),
    }
}

/// Parses the integer prefix of `s` ("12abc" -> 12, "abc" -> none).
fn leading_int(s: &str) -> Result<Option<i64>, ()> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => ("-", &s[1..]),
        Some(b'+') => ("", &s[1..]),
        _ => ("", s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok(None);
    }
    format!("{sign}{}", &rest[..digits])
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ())
}
