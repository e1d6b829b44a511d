//! Bond persistence in the nRF52840's internal flash.
//!
//! The whole bond table is stored as one `sequential-storage` map item;
//! the crate handles wear levelling and garbage collection over the
//! reserved pages.

use defmt::Debug2Format;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

use super::transport::SoftdeviceTransport;
use crate::ble::bonds::TABLE_BLOB_SIZE;
use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::error::Error;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Map key of the bond table item.
const KEY_BOND_TABLE: u8 = 0x01;

/// Scratch buffer: item header, key and the largest table.
const SCRATCH_SIZE: usize = TABLE_BLOB_SIZE + 32;

/// Replace the in-memory bond table with the one stored in flash.
pub async fn load(flash: &mut impl NorFlash, transport: &SoftdeviceTransport) -> Result<(), Error> {
    let mut buf = [0u8; SCRATCH_SIZE];

    let stored = fetch_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &KEY_BOND_TABLE,
    )
    .await
    .map_err(|e| {
        error!("bond store read error: {:?}", Debug2Format(&e));
        Error::Storage
    })?;

    match stored {
        Some(blob) => {
            let n = transport.with_bonds(|b| {
                b.deserialize_all(blob);
                b.len()
            });
            info!("loaded {} bonds from flash", n);
        }
        None => info!("no bonds in flash"),
    }
    Ok(())
}

/// Write the bond table to flash if it changed since the last save.
pub async fn save(flash: &mut impl NorFlash, transport: &SoftdeviceTransport) -> Result<(), Error> {
    let mut blob = [0u8; TABLE_BLOB_SIZE];
    // Clean before writing so a bond added meanwhile is saved next time.
    let Some(len) = transport.with_bonds(|b| {
        let dirty = b.is_dirty();
        b.mark_clean();
        dirty.then(|| b.serialize_all(&mut blob))
    }) else {
        debug!("bond table unchanged");
        return Ok(());
    };

    let mut buf = [0u8; SCRATCH_SIZE];
    let item: &[u8] = &blob[..len];
    store_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &KEY_BOND_TABLE,
        &item,
    )
    .await
    .map_err(|e| {
        error!("bond store write error: {:?}", Debug2Format(&e));
        transport.with_bonds(|b| b.mark_dirty());
        Error::Storage
    })?;

    info!("saved bond table ({} bytes)", len);
    Ok(())
}
