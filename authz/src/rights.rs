//! Access mask bits used by directory service objects ([MS-ADTS] 5.1.3.2).

pub const ADS_RIGHT_DS_CREATE_CHILD: u32 = 0x0000_0001;
pub const ADS_RIGHT_DS_DELETE_CHILD: u32 = 0x0000_0002;
pub const ADS_RIGHT_ACTRL_DS_LIST: u32 = 0x0000_0004;
pub const ADS_RIGHT_DS_SELF: u32 = 0x0000_0008;
pub const ADS_RIGHT_DS_READ_PROP: u32 = 0x0000_0010;
pub const ADS_RIGHT_DS_WRITE_PROP: u32 = 0x0000_0020;
pub const ADS_RIGHT_DS_DELETE_TREE: u32 = 0x0000_0040;
pub const ADS_RIGHT_DS_LIST_OBJECT: u32 = 0x0000_0080;
pub const ADS_RIGHT_DS_CONTROL_ACCESS: u32 = 0x0000_0100;

pub const ADS_RIGHT_DELETE: u32 = 0x0001_0000;
pub const ADS_RIGHT_READ_CONTROL: u32 = 0x0002_0000;
pub const ADS_RIGHT_WRITE_DAC: u32 = 0x0004_0000;
pub const ADS_RIGHT_WRITE_OWNER: u32 = 0x0008_0000;

pub const ADS_RIGHT_GENERIC_ALL: u32 = 0x1000_0000;

// Every standard and directory-specific right, as written by the directory
// when "full control" is granted. Differs from the generic bit above, which
// the server maps on access check but which never appears in stored ACEs.
pub const ADS_RIGHT_DS_FULL_CONTROL: u32 = ADS_RIGHT_DELETE
    | ADS_RIGHT_READ_CONTROL
    | ADS_RIGHT_WRITE_DAC
    | ADS_RIGHT_WRITE_OWNER
    | ADS_RIGHT_DS_CREATE_CHILD
    | ADS_RIGHT_DS_DELETE_CHILD
    | ADS_RIGHT_ACTRL_DS_LIST
    | ADS_RIGHT_DS_SELF
    | ADS_RIGHT_DS_READ_PROP
    | ADS_RIGHT_DS_WRITE_PROP
    | ADS_RIGHT_DS_DELETE_TREE
    | ADS_RIGHT_DS_LIST_OBJECT
    | ADS_RIGHT_DS_CONTROL_ACCESS;
