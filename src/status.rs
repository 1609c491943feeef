//! Order and payment status codes.
//!
//! Both enums are stored as `SMALLINT` and travel over JSON as their integer code, so the
//! numbering below is part of the public contract.

use diesel::{
    AsExpression, FromSqlRow,
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types::SmallInt,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} code {code}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub code: i16,
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident = $code:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
        #[diesel(sql_type = SmallInt)]
        #[repr(i16)]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub const fn code(self) -> i16 {
                self as i16
            }

            /// Human readable label shown to app users.
            pub const fn text(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl TryFrom<i16> for $name {
            type Error = UnknownStatus;

            fn try_from(code: i16) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownStatus { kind: $kind, code }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i16(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = i16::deserialize(deserializer)?;
                $name::try_from(code).map_err(serde::de::Error::custom)
            }
        }

        impl ToSql<SmallInt, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                let code = self.code();
                <i16 as ToSql<SmallInt, Pg>>::to_sql(&code, &mut out.reborrow())
            }
        }

        impl FromSql<SmallInt, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let code = <i16 as FromSql<SmallInt, Pg>>::from_sql(bytes)?;
                Ok($name::try_from(code)?)
            }
        }
    };
}

status_enum! {
    /// Lifecycle of an order.
    OrderStatus, "order status" {
        WaitForPayment = 0 => "待支付",
        Waiting = 1 => "待接单",
        Accepted = 2 => "已接单",
        Completed = 3 => "已完成",
        Cancelled = 4 => "已取消",
        Refunded = 5 => "已退款",
        Reviewed = 6 => "已评价",
    }
}

status_enum! {
    PaymentStatus, "payment status" {
        Unpaid = 0 => "未支付",
        Paid = 1 => "已支付",
        Failed = 2 => "支付失败",
        Refunding = 3 => "退款中",
        Refunded = 4 => "已退款",
    }
}

impl OrderStatus {
    /// No service-level transition leaves these states.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Refunded | OrderStatus::Reviewed
        )
    }
}

/// The status changes this service is allowed to perform.
///
/// `Accepted` and `Completed` are reached through the fulfillment workflow, which writes them
/// directly; they only show up here as preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Cancel,
    Review,
}

impl Transition {
    pub const fn from(self) -> OrderStatus {
        match self {
            Transition::Cancel => OrderStatus::Waiting,
            Transition::Review => OrderStatus::Completed,
        }
    }

    pub const fn to(self) -> OrderStatus {
        match self {
            Transition::Cancel => OrderStatus::Cancelled,
            Transition::Review => OrderStatus::Reviewed,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Transition::Cancel => "cancel",
            Transition::Review => "review",
        }
    }

    /// Past-tense verb for error messages ("cannot be cancelled").
    pub const fn verb(self) -> &'static str {
        match self {
            Transition::Cancel => "cancelled",
            Transition::Review => "reviewed",
        }
    }

    /// Returns the next status if `current` is the one this transition starts from.
    pub fn apply(self, current: OrderStatus) -> Option<OrderStatus> {
        (current == self.from()).then_some(self.to())
    }
}
