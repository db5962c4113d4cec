// src/models/mod.rs
pub mod clinic;
pub mod doctor;
pub mod order;

pub use clinic::{
    AccountStatus, Clinic, ClinicInfo, RegisterClinicRequest, UpdateClinicRequest,
    UpdateClinicStatusRequest,
};
pub use doctor::{
    encode_list, CreateDoctorRequest, Doctor, DoctorDetails, DoctorStatus, UpdateDoctorRequest,
    WorkplaceType,
};
pub use order::{
    CreateOrderRequest, Order, OrderListItem, OrderStatus, UpdateOrderRequest, UrgencyLevel,
};
