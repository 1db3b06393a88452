//! NimBLE central adapter, selected by the `nimble` feature.
//!
//! Same contract as the Bluedroid adapter: host-stack callbacks translate
//! into [`LinkEvent`]s on the link channel and nothing else. NimBLE
//! reports GAP and GATT completions through per-procedure C callbacks
//! rather than one registered handler, so each procedure installs its own
//! trampoline.

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicU16, Ordering};

use esp_idf_sys as sys;
use log::debug;

use crate::ble::central::BleCentral;
use crate::ble::{
    BdAddr, GattStatus, HandleRange, LinkEvent, MAX_MEASUREMENT_LEN,
};
use crate::channels::push_link_event;
use crate::error::BleError;

static CONN_HANDLE: AtomicU16 = AtomicU16::new(sys::BLE_HS_CONN_HANDLE_NONE as u16);

fn check(rc: core::ffi::c_int) -> Result<(), BleError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(BleError::Stack(rc))
    }
}

fn conn_handle() -> u16 {
    CONN_HANDLE.load(Ordering::SeqCst)
}

pub struct NimbleCentral {
    _private: (),
}

impl NimbleCentral {
    /// NimBLE's host task must already be running; `esp_nimble_hci_init`
    /// and `nimble_port_init` happen in the boot sequence.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl BleCentral for NimbleCentral {
    fn start_scan(&mut self) -> Result<(), BleError> {
        // Active scan, duplicates filtered by the controller.
        let params = sys::ble_gap_disc_params {
            itvl: 0x50,
            window: 0x30,
            filter_policy: 0,
            _bitfield_align_1: [],
            _bitfield_1: sys::ble_gap_disc_params::new_bitfield_1(0, 0, 1),
        };
        check(unsafe {
            sys::ble_gap_disc(
                sys::BLE_OWN_ADDR_PUBLIC as u8,
                sys::BLE_HS_FOREVER as i32,
                &params,
                Some(gap_event),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::Scan)
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        check(unsafe { sys::ble_gap_disc_cancel() }).map_err(|_| BleError::Scan)
    }

    fn connect(&mut self, addr: BdAddr) -> Result<(), BleError> {
        let peer = sys::ble_addr_t {
            type_: sys::BLE_ADDR_PUBLIC as u8,
            val: addr,
        };
        check(unsafe {
            sys::ble_gap_connect(
                sys::BLE_OWN_ADDR_PUBLIC as u8,
                &peer,
                10_000, // connect timeout, ms
                ptr::null(),
                Some(gap_event),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::Connect)
    }

    fn cancel_connect(&mut self) -> Result<(), BleError> {
        check(unsafe { sys::ble_gap_conn_cancel() }).map_err(|_| BleError::Connect)
    }

    fn discover_services(&mut self, uuid: u16) -> Result<(), BleError> {
        let filter = uuid16(uuid);
        check(unsafe {
            sys::ble_gattc_disc_svc_by_uuid(
                conn_handle(),
                &filter.u,
                Some(on_service),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::Discovery)
    }

    fn discover_characteristics(&mut self, range: HandleRange) -> Result<(), BleError> {
        check(unsafe {
            sys::ble_gattc_disc_all_chrs(
                conn_handle(),
                range.start,
                range.end,
                Some(on_characteristic),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::Discovery)
    }

    fn discover_descriptors(&mut self, characteristic: u16) -> Result<(), BleError> {
        // NimBLE walks descriptors from the characteristic's value handle
        // to the end of the service; 0xFFFF covers the remainder.
        check(unsafe {
            sys::ble_gattc_disc_all_dscs(
                conn_handle(),
                characteristic,
                0xFFFF,
                Some(on_descriptor),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::Discovery)
    }

    fn write_descriptor(&mut self, handle: u16, value: &[u8]) -> Result<(), BleError> {
        check(unsafe {
            sys::ble_gattc_write_flat(
                conn_handle(),
                handle,
                value.as_ptr() as *const c_void,
                value.len() as u16,
                Some(on_descriptor_write),
                ptr::null_mut(),
            )
        })
        .map_err(|_| BleError::DescriptorWrite)
    }

    fn disconnect(&mut self) -> Result<(), BleError> {
        check(unsafe {
            sys::ble_gap_terminate(
                conn_handle(),
                sys::BLE_ERR_REM_USER_CONN_TERM as u8,
            )
        })
        .map_err(|_| BleError::Disconnect)
    }
}

impl Default for NimbleCentral {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid16(uuid: u16) -> sys::ble_uuid16_t {
    sys::ble_uuid16_t {
        u: sys::ble_uuid_t {
            type_: sys::BLE_UUID_TYPE_16 as u8,
        },
        value: uuid,
    }
}

fn gatt_status(status: u16) -> GattStatus {
    if status == 0 || status == sys::BLE_HS_EDONE as u16 {
        GattStatus::Ok
    } else {
        GattStatus::Err(i32::from(status))
    }
}

/// Extract 16-bit service UUIDs from advertisement fields.
fn adv_service_uuids(data: &[u8]) -> heapless::Vec<u16, 8> {
    let mut out = heapless::Vec::new();
    let mut fields = sys::ble_hs_adv_fields::default();
    let rc = unsafe {
        sys::ble_hs_adv_parse_fields(&mut fields, data.as_ptr(), data.len() as u8)
    };
    if rc != 0 {
        return out;
    }
    let count = usize::from(fields.num_uuids16);
    if !fields.uuids16.is_null() {
        for i in 0..count.min(out.capacity()) {
            let uuid = unsafe { (*fields.uuids16.add(i)).value };
            let _ = out.push(uuid);
        }
    }
    out
}

unsafe extern "C" fn gap_event(
    event: *mut sys::ble_gap_event,
    _arg: *mut c_void,
) -> core::ffi::c_int {
    let event = unsafe { &*event };
    match u32::from(event.type_) {
        sys::BLE_GAP_EVENT_DISC => {
            let disc = unsafe { event.__bindgen_anon_1.disc };
            let data = unsafe {
                core::slice::from_raw_parts(disc.data, usize::from(disc.length_data))
            };
            let services = adv_service_uuids(data);
            if !services.is_empty() {
                push_link_event(LinkEvent::Advertisement {
                    addr: disc.addr.val,
                    services,
                });
            }
        }
        sys::BLE_GAP_EVENT_DISC_COMPLETE => {
            push_link_event(LinkEvent::ScanStopped);
        }
        sys::BLE_GAP_EVENT_CONNECT => {
            let connect = unsafe { event.__bindgen_anon_1.connect };
            if connect.status == 0 {
                CONN_HANDLE.store(connect.conn_handle, Ordering::SeqCst);
                push_link_event(LinkEvent::Connected);
            } else {
                push_link_event(LinkEvent::ConnectFailed {
                    status: connect.status,
                });
            }
        }
        sys::BLE_GAP_EVENT_DISCONNECT => {
            let disconnect = unsafe { event.__bindgen_anon_1.disconnect };
            CONN_HANDLE.store(sys::BLE_HS_CONN_HANDLE_NONE as u16, Ordering::SeqCst);
            push_link_event(LinkEvent::Disconnected {
                reason: disconnect.reason,
            });
        }
        sys::BLE_GAP_EVENT_NOTIFY_RX => {
            let notify = unsafe { event.__bindgen_anon_1.notify_rx };
            let om = unsafe { &*notify.om };
            let len = usize::from(om.om_len).min(MAX_MEASUREMENT_LEN);
            let data = unsafe { core::slice::from_raw_parts(om.om_data, len) };
            if let Ok(payload) = heapless::Vec::from_slice(data) {
                push_link_event(LinkEvent::Notification {
                    handle: notify.attr_handle,
                    payload,
                });
            }
        }
        other => debug!("gap event {other}"),
    }
    0
}

unsafe extern "C" fn on_service(
    _conn_handle: u16,
    error: *const sys::ble_gatt_error,
    service: *const sys::ble_gatt_svc,
    _arg: *mut c_void,
) -> core::ffi::c_int {
    let status = unsafe { (*error).status };
    if status == 0 && !service.is_null() {
        let svc = unsafe { &*service };
        if svc.uuid.u.type_ == sys::BLE_UUID_TYPE_16 as u8 {
            let uuid = unsafe { svc.uuid.__bindgen_anon_1.u16_.value };
            push_link_event(LinkEvent::ServiceFound {
                range: HandleRange {
                    start: svc.start_handle,
                    end: svc.end_handle,
                },
                uuid,
            });
        }
    } else {
        push_link_event(LinkEvent::ServicesComplete {
            status: gatt_status(status),
        });
    }
    0
}

unsafe extern "C" fn on_characteristic(
    _conn_handle: u16,
    error: *const sys::ble_gatt_error,
    chr: *const sys::ble_gatt_chr,
    _arg: *mut c_void,
) -> core::ffi::c_int {
    let status = unsafe { (*error).status };
    if status == 0 && !chr.is_null() {
        let chr = unsafe { &*chr };
        if chr.uuid.u.type_ == sys::BLE_UUID_TYPE_16 as u8 {
            let uuid = unsafe { chr.uuid.__bindgen_anon_1.u16_.value };
            push_link_event(LinkEvent::CharacteristicFound {
                handle: chr.val_handle,
                uuid,
            });
        }
    } else {
        push_link_event(LinkEvent::CharacteristicsComplete {
            status: gatt_status(status),
        });
    }
    0
}

unsafe extern "C" fn on_descriptor(
    _conn_handle: u16,
    error: *const sys::ble_gatt_error,
    _chr_val_handle: u16,
    dsc: *const sys::ble_gatt_dsc,
    _arg: *mut c_void,
) -> core::ffi::c_int {
    let status = unsafe { (*error).status };
    if status == 0 && !dsc.is_null() {
        let dsc = unsafe { &*dsc };
        if dsc.uuid.u.type_ == sys::BLE_UUID_TYPE_16 as u8 {
            let uuid = unsafe { dsc.uuid.__bindgen_anon_1.u16_.value };
            push_link_event(LinkEvent::DescriptorFound {
                handle: dsc.handle,
                uuid,
            });
        }
    } else {
        push_link_event(LinkEvent::DescriptorsComplete {
            status: gatt_status(status),
        });
    }
    0
}

unsafe extern "C" fn on_descriptor_write(
    _conn_handle: u16,
    error: *const sys::ble_gatt_error,
    _attr: *mut sys::ble_gatt_attr,
    _arg: *mut c_void,
) -> core::ffi::c_int {
    let status = unsafe { (*error).status };
    push_link_event(LinkEvent::DescriptorWritten {
        status: gatt_status(status),
    });
    0
}
