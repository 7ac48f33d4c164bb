use reqwest::Url;

use crate::channel::RelayEndpoints;
use crate::session::{ClientId, TransferOffer};

/// A download handed to the [`DownloadAgent`](super::DownloadAgent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Full `/stream?to=..&from=..&name=..&size=..` URL
    pub url: Url,
    /// Sending client
    pub from: ClientId,
    /// File name as offered
    pub name: String,
    /// Offered size in bytes
    pub size: u64,
}

impl DownloadRequest {
    /// Request for the file `offer` describes, fetched by `me`.
    pub fn for_offer(endpoints: &RelayEndpoints, me: &ClientId, offer: &TransferOffer) -> Self {
        let mut url = endpoints.transfer_url().clone();
        url.query_pairs_mut()
            .append_pair("to", me.as_str())
            .append_pair("from", offer.from.as_str())
            .append_pair("name", &offer.name)
            .append_pair("size", &offer.size.to_string());

        Self {
            url,
            from: offer.from.clone(),
            name: offer.name.clone(),
            size: offer.size,
        }
    }
}
