/*
 * Copyright 2025 Michael Krolikowski
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use anyhow::Result;
use log::debug;
use oci_client::{Client, Reference, secrets::RegistryAuth};

use super::{image_reference::ImageReference, tag_filter::TagFilter, throttle::Throttle};

pub trait LatestImageVersion {
    async fn latest_image_version(
        &self,
        client: &Client,
        throttle: &Throttle,
        filter: &TagFilter,
    ) -> Result<Option<String>>;
}

fn oci_reference(image: &ImageReference) -> Reference {
    Reference::with_tag(image.registry.clone(), image.path(), image.tag.clone())
}

async fn image_tags(
    client: &Client,
    throttle: &Throttle,
    image: &ImageReference,
) -> Result<Vec<String>> {
    let reference = oci_reference(image);

    let mut tags = Vec::new();
    let mut last: Option<String> = None;
    loop {
        let request = async {
            let response = client
                .list_tags(&reference, &RegistryAuth::Anonymous, None, last.as_deref())
                .await?;
            Ok::<_, anyhow::Error>(response.tags)
        };
        let mut page = throttle.request(request).await?;
        match page.split_last_mut() {
            // registries without paging support answer with the same page again
            Some((l, _)) if Some(l.to_string()) == last => break,
            Some((l, page)) => {
                tags.extend_from_slice(page);
                tags.push(l.to_string());
                last = Some(l.to_string());
            }
            _ => break,
        }
    }
    Ok(tags)
}

impl LatestImageVersion for ImageReference {
    async fn latest_image_version(
        &self,
        client: &Client,
        throttle: &Throttle,
        filter: &TagFilter,
    ) -> Result<Option<String>> {
        let tags = image_tags(client, throttle, self).await?;
        let kind = if self.is_official() {
            "official image"
        } else {
            "image"
        };
        debug!("{} {} has {} tags", kind, self.path(), tags.len());
        let latest = filter.latest(tags.iter().map(String::as_str));
        Ok(latest.map(str::to_string))
    }
}
