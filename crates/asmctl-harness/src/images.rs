//! Image selection by filter and published date

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::{OsImage, ServiceCatalog, VmImage};
use crate::error::{HarnessError, Result};

/// Image family used for Linux test deployments
pub const LINUX_TEST_FAMILY: &str = "Ubuntu Server 14.04 LTS";

/// Anything with a name and a publication date
pub trait PublishedImage {
    fn name(&self) -> &str;
    fn published_date(&self) -> Option<DateTime<Utc>>;
}

impl PublishedImage for OsImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn published_date(&self) -> Option<DateTime<Utc>> {
        self.published_date
    }
}

impl PublishedImage for VmImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn published_date(&self) -> Option<DateTime<Utc>> {
        self.published_date
    }
}

/// Newest image accepted by `filter`
///
/// Images without a date sort before any dated image; among equal dates the
/// first one listed wins.
pub fn select_latest<I, F>(images: Vec<I>, description: &str, filter: F) -> Result<I>
where
    I: PublishedImage,
    F: Fn(&I) -> bool,
{
    let mut newest: Option<I> = None;
    for image in images.into_iter().filter(|im| filter(im)) {
        let replace = newest
            .as_ref()
            .is_none_or(|current| image.published_date() > current.published_date());
        if replace {
            newest = Some(image);
        }
    }

    newest.ok_or_else(|| HarnessError::NoMatchingImage {
        filter: description.to_string(),
    })
}

pub fn is_linux_test_image(image: &OsImage) -> bool {
    image.category == "Public" && image.image_family == LINUX_TEST_FAMILY
}

pub async fn os_image<C, F>(catalog: &C, description: &str, filter: F) -> Result<OsImage>
where
    C: ServiceCatalog + ?Sized,
    F: Fn(&OsImage) -> bool,
{
    info!("Selecting OS image");
    let images = catalog
        .list_os_images()
        .await
        .map_err(HarnessError::catalog("ListOSImages"))?;
    let image = select_latest(images, description, filter)?;
    info!("Selecting image '{}'", image.name);
    Ok(image)
}

pub async fn vm_image<C, F>(catalog: &C, description: &str, filter: F) -> Result<VmImage>
where
    C: ServiceCatalog + ?Sized,
    F: Fn(&VmImage) -> bool,
{
    info!("Selecting VM image");
    let images = catalog
        .list_vm_images()
        .await
        .map_err(HarnessError::catalog("ListVirtualMachineImages"))?;
    let image = select_latest(images, description, filter)?;
    info!("Selecting image '{}'", image.name);
    Ok(image)
}

/// Newest public Ubuntu image
pub async fn linux_test_image<C>(catalog: &C) -> Result<OsImage>
where
    C: ServiceCatalog + ?Sized,
{
    os_image(catalog, LINUX_TEST_FAMILY, is_linux_test_image).await
}

/// A captured image with exactly this name
pub async fn user_image<C>(catalog: &C, name: &str) -> Result<OsImage>
where
    C: ServiceCatalog + ?Sized,
{
    os_image(catalog, &format!("user image {name}"), |im| {
        im.category == "User" && im.name == name
    })
    .await
}
