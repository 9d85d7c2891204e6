use crate::Error;

pub use tokio_util::sync::CancellationToken;

/// Checks if cancellation was requested and returns [`Error::Cancelled`] if so.
///
/// Meant for cooperative checks inside submitted work. When such work bails out
/// this way while its token is cancelled, the factory records the promise as
/// cancelled rather than faulted.
///
/// ```
/// use promise_chain::{check_cancellation, CancellationToken, Error};
///
/// fn sum(token: &CancellationToken, items: &[u64]) -> Result<u64, Error> {
///     let mut total = 0;
///     for item in items {
///         check_cancellation::<Error>(token, "sum")?;
///         total += item;
///     }
///     Ok(total)
/// }
///
/// let token = CancellationToken::new();
/// assert_eq!(sum(&token, &[1, 2, 3]), Ok(6));
/// token.cancel();
/// assert_eq!(sum(&token, &[1, 2, 3]), Err(Error::Cancelled));
/// ```
pub fn check_cancellation<E: From<Error>>(token: &CancellationToken, context: &str) -> Result<(), E> {
    if token.is_cancelled() {
        tracing::debug!(context, "cancellation requested");
        return Err(Error::Cancelled.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert_eq!(check_cancellation::<Error>(&observer, "before"), Ok(()));
        token.cancel();
        assert_eq!(check_cancellation::<Error>(&observer, "after"), Err(Error::Cancelled));
    }
}
