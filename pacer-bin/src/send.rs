use anyhow::{Result, bail};
use log::{debug, warn};
use pacer_lib::Dispatcher;
use reqwest::{Client, Method};

use crate::response::{Response, ResponseStatus};
use crate::stats::ResponseStats;

/// Send one request per URL through the dispatcher.
///
/// URLs which can't be turned into a request are reported as errors in
/// their slot; the rest are submitted as one batch. The returned stats keep
/// the input order.
pub(crate) async fn send(
    dispatcher: &Dispatcher<Client>,
    client: &Client,
    method: &Method,
    urls: Vec<String>,
) -> Result<ResponseStats> {
    let mut requests = Vec::with_capacity(urls.len());
    let mut invalid = Vec::with_capacity(urls.len());
    for url in &urls {
        match client.request(method.clone(), url.as_str()).build() {
            Ok(request) => {
                requests.push(request);
                invalid.push(None);
            }
            Err(e) => {
                warn!("Skipping invalid URL `{url}`: {e}");
                invalid.push(Some(ResponseStatus::Error(e.to_string())));
            }
        }
    }

    debug!("Sending {} request(s)", requests.len());
    let mut outcomes = dispatcher.call_batch(requests).await?.into_iter();

    let mut stats = ResponseStats::new();
    for (url, invalid) in urls.into_iter().zip(invalid) {
        let status = match invalid {
            Some(status) => status,
            None => match outcomes.next() {
                Some(outcome) => ResponseStatus::from(outcome),
                None => bail!("Missing result for `{url}`"),
            },
        };
        stats.add(Response::new(url, status));
    }
    Ok(stats)
}
