//! Bluedroid GATT client adapter.
//!
//! Registers GAP and GATTC callbacks with the Bluedroid stack and
//! translates their events into [`LinkEvent`]s on the link channel. The
//! callbacks run on the Bluetooth task; they only parse and enqueue.
//! Characteristic and descriptor enumeration uses the stack's attribute
//! cache, which is synchronous, so those results are synthesized into the
//! same event stream the asynchronous procedures produce.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};

use esp_idf_sys as sys;
use log::{debug, warn};

use crate::ble::central::BleCentral;
use crate::ble::{
    BdAddr, GattStatus, HandleRange, LinkEvent, CCCD_UUID, HEART_RATE_MEASUREMENT_UUID,
    MAX_MEASUREMENT_LEN,
};
use crate::channels::push_link_event;
use crate::error::{BleError, Error};

const APP_ID: u16 = 0;
const SCAN_DURATION_S: u32 = 0; // scan until stopped

static GATTC_IF: AtomicU16 = AtomicU16::new(u16::MAX);
static CONN_ID: AtomicU16 = AtomicU16::new(u16::MAX);
/// Peer address packed little-endian into the low 48 bits.
static PEER_ADDR: AtomicU64 = AtomicU64::new(0);
static REGISTERED: AtomicBool = AtomicBool::new(false);

fn pack_addr(addr: &BdAddr) -> u64 {
    addr.iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn unpack_addr(packed: u64) -> BdAddr {
    let mut addr = [0u8; 6];
    for (i, b) in addr.iter_mut().enumerate() {
        *b = (packed >> (8 * i)) as u8;
    }
    addr
}

fn check(err: sys::esp_err_t) -> Result<(), BleError> {
    if err == sys::ESP_OK {
        Ok(())
    } else {
        Err(BleError::Stack(err))
    }
}

pub struct BluedroidCentral {
    _private: (),
}

impl BluedroidCentral {
    /// Bring up the controller and Bluedroid and register the callbacks.
    /// Must be called once, before any other method.
    pub fn init() -> Result<Self, Error> {
        if REGISTERED.swap(true, Ordering::SeqCst) {
            return Err(Error::Init("bluetooth stack already initialised"));
        }
        unsafe {
            let mut bt_cfg: sys::esp_bt_controller_config_t =
                sys::esp_bt_controller_config_t::default();
            bt_cfg.controller_task_stack_size = sys::ESP_TASK_BT_CONTROLLER_STACK as _;
            check(sys::esp_bt_controller_init(&mut bt_cfg))?;
            check(sys::esp_bt_controller_enable(sys::esp_bt_mode_t_ESP_BT_MODE_BLE))?;
            check(sys::esp_bluedroid_init())?;
            check(sys::esp_bluedroid_enable())?;
            check(sys::esp_ble_gap_register_callback(Some(gap_callback)))?;
            check(sys::esp_ble_gattc_register_callback(Some(gattc_callback)))?;
            check(sys::esp_ble_gattc_app_register(APP_ID))?;
        }
        Ok(Self { _private: () })
    }
}

impl BleCentral for BluedroidCentral {
    fn start_scan(&mut self) -> Result<(), BleError> {
        unsafe {
            let mut params = sys::esp_ble_scan_params_t {
                scan_type: sys::esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
                own_addr_type: sys::esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                scan_filter_policy: sys::esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
                scan_interval: 0x50,
                scan_window: 0x30,
                scan_duplicate: sys::esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
            };
            check(sys::esp_ble_gap_set_scan_params(&mut params))?;
            check(sys::esp_ble_gap_start_scanning(SCAN_DURATION_S))
        }
        .map_err(|_| BleError::Scan)
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        check(unsafe { sys::esp_ble_gap_stop_scanning() }).map_err(|_| BleError::Scan)
    }

    fn connect(&mut self, addr: BdAddr) -> Result<(), BleError> {
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        if gattc_if == u16::MAX {
            return Err(BleError::Connect);
        }
        PEER_ADDR.store(pack_addr(&addr), Ordering::SeqCst);
        let mut bda = addr;
        check(unsafe {
            sys::esp_ble_gattc_open(
                gattc_if as _,
                bda.as_mut_ptr(),
                sys::esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                true,
            )
        })
        .map_err(|_| BleError::Connect)
    }

    fn cancel_connect(&mut self) -> Result<(), BleError> {
        self.disconnect()
    }

    fn discover_services(&mut self, uuid: u16) -> Result<(), BleError> {
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        let conn_id = CONN_ID.load(Ordering::SeqCst);
        let mut filter = uuid16(uuid);
        check(unsafe {
            sys::esp_ble_gattc_search_service(gattc_if as _, conn_id, &mut filter)
        })
        .map_err(|_| BleError::Discovery)
    }

    fn discover_characteristics(&mut self, range: HandleRange) -> Result<(), BleError> {
        // Synchronous lookup in the attribute cache.
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        let conn_id = CONN_ID.load(Ordering::SeqCst);
        let mut result = sys::esp_gattc_char_elem_t::default();
        let mut count: u16 = 1;
        let status = unsafe {
            sys::esp_ble_gattc_get_char_by_uuid(
                gattc_if as _,
                conn_id,
                range.start,
                range.end,
                uuid16(HEART_RATE_MEASUREMENT_UUID),
                &mut result,
                &mut count,
            )
        };
        if status == sys::esp_gatt_status_t_ESP_GATT_OK && count > 0 {
            push_link_event(LinkEvent::CharacteristicFound {
                handle: result.char_handle,
                uuid: HEART_RATE_MEASUREMENT_UUID,
            });
            push_link_event(LinkEvent::CharacteristicsComplete {
                status: GattStatus::Ok,
            });
        } else {
            push_link_event(LinkEvent::CharacteristicsComplete {
                status: GattStatus::Err(status as i32),
            });
        }
        Ok(())
    }

    fn discover_descriptors(&mut self, characteristic: u16) -> Result<(), BleError> {
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        let conn_id = CONN_ID.load(Ordering::SeqCst);
        // Register for notifications first; Bluedroid requires it before
        // the CCCD write takes effect.
        unsafe {
            let mut remote = unpack_addr(PEER_ADDR.load(Ordering::SeqCst));
            sys::esp_ble_gattc_register_for_notify(
                gattc_if as _,
                remote.as_mut_ptr(),
                characteristic,
            );
        }
        let mut result = sys::esp_gattc_descr_elem_t::default();
        let mut count: u16 = 1;
        let status = unsafe {
            sys::esp_ble_gattc_get_descr_by_char_handle(
                gattc_if as _,
                conn_id,
                characteristic,
                uuid16(CCCD_UUID),
                &mut result,
                &mut count,
            )
        };
        if status == sys::esp_gatt_status_t_ESP_GATT_OK && count > 0 {
            push_link_event(LinkEvent::DescriptorFound {
                handle: result.handle,
                uuid: CCCD_UUID,
            });
            push_link_event(LinkEvent::DescriptorsComplete {
                status: GattStatus::Ok,
            });
        } else {
            push_link_event(LinkEvent::DescriptorsComplete {
                status: GattStatus::Err(status as i32),
            });
        }
        Ok(())
    }

    fn write_descriptor(&mut self, handle: u16, value: &[u8]) -> Result<(), BleError> {
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        let conn_id = CONN_ID.load(Ordering::SeqCst);
        check(unsafe {
            sys::esp_ble_gattc_write_char_descr(
                gattc_if as _,
                conn_id,
                handle,
                value.len() as u16,
                value.as_ptr() as *mut u8,
                sys::esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                sys::esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        })
        .map_err(|_| BleError::DescriptorWrite)
    }

    fn disconnect(&mut self) -> Result<(), BleError> {
        let gattc_if = GATTC_IF.load(Ordering::SeqCst);
        let conn_id = CONN_ID.load(Ordering::SeqCst);
        check(unsafe { sys::esp_ble_gattc_close(gattc_if as _, conn_id) })
            .map_err(|_| BleError::Disconnect)
    }
}

fn uuid16(uuid: u16) -> sys::esp_bt_uuid_t {
    sys::esp_bt_uuid_t {
        len: sys::ESP_UUID_LEN_16 as u16,
        uuid: sys::esp_bt_uuid_t__bindgen_ty_1 { uuid16: uuid },
    }
}

/// Extract 16-bit service UUIDs from raw advertisement data.
fn adv_service_uuids(data: &[u8]) -> heapless::Vec<u16, 8> {
    let mut out = heapless::Vec::new();
    let mut i = 0;
    while i + 1 < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + 1 + len > data.len() {
            break;
        }
        let ad_type = data[i + 1];
        // Incomplete (0x02) or complete (0x03) list of 16-bit UUIDs.
        if ad_type == 0x02 || ad_type == 0x03 {
            let mut j = i + 2;
            while j + 1 < i + 1 + len {
                let uuid = u16::from_le_bytes([data[j], data[j + 1]]);
                let _ = out.push(uuid);
                j += 2;
            }
        }
        i += 1 + len;
    }
    out
}

unsafe extern "C" fn gap_callback(
    event: sys::esp_gap_ble_cb_event_t,
    param: *mut sys::esp_ble_gap_cb_param_t,
) {
    match event {
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {}
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let result = unsafe { &(*param).scan_rst };
            if result.search_evt
                == sys::esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT
            {
                let adv_len = result.adv_data_len as usize;
                let data = &result.ble_adv[..adv_len.min(result.ble_adv.len())];
                let services = adv_service_uuids(data);
                if !services.is_empty() {
                    push_link_event(LinkEvent::Advertisement {
                        addr: result.bda,
                        services,
                    });
                }
            }
        }
        sys::esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_STOP_COMPLETE_EVT => {
            push_link_event(LinkEvent::ScanStopped);
        }
        _ => debug!("gap event {event}"),
    }
}

unsafe extern "C" fn gattc_callback(
    event: sys::esp_gattc_cb_event_t,
    gattc_if: sys::esp_gatt_if_t,
    param: *mut sys::esp_ble_gattc_cb_param_t,
) {
    match event {
        sys::esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
            GATTC_IF.store(gattc_if as u16, Ordering::SeqCst);
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
            let open = unsafe { &(*param).open };
            if open.status == sys::esp_gatt_status_t_ESP_GATT_OK {
                CONN_ID.store(open.conn_id, Ordering::SeqCst);
                push_link_event(LinkEvent::Connected);
            } else {
                push_link_event(LinkEvent::ConnectFailed {
                    status: open.status as i32,
                });
            }
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
            let res = unsafe { &(*param).search_res };
            if res.srvc_id.uuid.len == sys::ESP_UUID_LEN_16 as u16 {
                let uuid = unsafe { res.srvc_id.uuid.uuid.uuid16 };
                push_link_event(LinkEvent::ServiceFound {
                    range: HandleRange {
                        start: res.start_handle,
                        end: res.end_handle,
                    },
                    uuid,
                });
            }
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
            let cmpl = unsafe { &(*param).search_cmpl };
            let status = if cmpl.status == sys::esp_gatt_status_t_ESP_GATT_OK {
                GattStatus::Ok
            } else {
                GattStatus::Err(cmpl.status as i32)
            };
            push_link_event(LinkEvent::ServicesComplete { status });
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_WRITE_DESCR_EVT => {
            let write = unsafe { &(*param).write };
            let status = if write.status == sys::esp_gatt_status_t_ESP_GATT_OK {
                GattStatus::Ok
            } else {
                GattStatus::Err(write.status as i32)
            };
            push_link_event(LinkEvent::DescriptorWritten { status });
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
            let notify = unsafe { &(*param).notify };
            let len = (notify.value_len as usize).min(MAX_MEASUREMENT_LEN);
            let data = unsafe { core::slice::from_raw_parts(notify.value, len) };
            if let Ok(payload) = heapless::Vec::from_slice(data) {
                push_link_event(LinkEvent::Notification {
                    handle: notify.handle,
                    payload,
                });
            }
        }
        sys::esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
            let disc = unsafe { &(*param).disconnect };
            CONN_ID.store(u16::MAX, Ordering::SeqCst);
            push_link_event(LinkEvent::Disconnected {
                reason: disc.reason as i32,
            });
        }
        _ => {
            if !is_ignored_event(event) {
                warn!("unhandled gattc event {event}");
            }
        }
    }
}

fn is_ignored_event(event: sys::esp_gattc_cb_event_t) -> bool {
    matches!(
        event,
        sys::esp_gattc_cb_event_t_ESP_GATTC_CONNECT_EVT
            | sys::esp_gattc_cb_event_t_ESP_GATTC_CFG_MTU_EVT
            | sys::esp_gattc_cb_event_t_ESP_GATTC_REG_FOR_NOTIFY_EVT
            | sys::esp_gattc_cb_event_t_ESP_GATTC_CLOSE_EVT
    )
}
